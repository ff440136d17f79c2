//! devnode: open a device by type and major/minor numbers.
//!
//! Containers often carry a `/dev` populated once at start, so hotplugged
//! devices (loop devices, USB serial adapters) have no node even though the
//! kernel knows them. This crate hands out an fd for such a device anyway.
//!
//! ## Strategies
//!
//! - **SearchExisting** - scan the device directory for a node with the right
//!   type and device id, then open it
//! - **CreateTransient** - on a dedicated thread, unshare the mount namespace,
//!   mount a tmpfs, `mknod` the node there and open it (needs `CAP_SYS_ADMIN`)
//! - **Auto** - SearchExisting, falling back to CreateTransient only when the
//!   node is not found
//!
//! ## Quick Start
//!
//! ```ignore
//! use devnode::{Access, DeviceDescriptor, OpenRequest, Opener};
//!
//! // /dev/zero is 1:5
//! let request = OpenRequest::new(DeviceDescriptor::character(1, 5), Access::Read);
//! let file = Opener::new().open_file(&request)?;
//! ```
//!
//! ## Async
//!
//! ```ignore
//! let fd = devnode::dispatch::open(Opener::new(), request).await?;
//! ```

pub mod device;
pub mod error;
pub mod isolation;
pub mod opener;
pub mod scan;
pub mod strategy;

#[cfg(feature = "tokio")]
pub mod dispatch;

use std::os::fd::OwnedFd;

pub use device::{Access, DeviceDescriptor, DeviceType};
pub use error::{AcquisitionError, ErrorKind, ParseError};
pub use isolation::IsolatedContext;
pub use opener::{OpenRequest, Opener, RawRequest, Strategy, acquire_with};
pub use scan::{EntryMatcher, Scanner};
pub use strategy::{Acquire, DevLookup, TmpfsSynthesis};

/// Acquire with the default configuration (`/dev`, `/`, `PATH_MAX`).
pub fn open(request: &OpenRequest) -> Result<OwnedFd, AcquisitionError> {
    Opener::default().open(request)
}
