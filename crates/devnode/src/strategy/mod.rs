//! Acquisition strategies.
//!
//! - **lookup** - Find an existing node in the device directory and open it
//! - **tmpfs** - Create the node on a private tmpfs in an isolated mount namespace

mod lookup;
mod tmpfs;

use std::os::fd::OwnedFd;

use rustix::fs::OFlags;

use crate::device::DeviceDescriptor;
use crate::error::AcquisitionError;

pub use lookup::DevLookup;
pub use tmpfs::{DEFAULT_NODE_NAME, DEFAULT_NODE_PERMISSIONS, TmpfsSynthesis};

/// One way of turning a device descriptor into an open fd.
pub trait Acquire {
    fn acquire(
        &self,
        device: &DeviceDescriptor,
        flags: OFlags,
    ) -> Result<OwnedFd, AcquisitionError>;
}
