//! Device node synthesis on a private tmpfs.
//!
//! ## Sequence (on an isolated thread)
//!
//! ```text
//! unshare(CLONE_NEWNS | CLONE_FS)
//!   → mount --make-rprivate /
//!   → first directory under the scan root becomes the mount point
//!   → mount -t tmpfs none <mount point>
//!   → chdir <mount point>
//!   → mknod ./devnode
//!   → open ./devnode
//! ```
//!
//! The mount point is whatever directory the kernel enumerates first. It is
//! not checked for suitability and no other candidate is tried when the mount
//! fails. A tmpfs is used rather than an existing writable directory because
//! `/tmp` and friends are commonly mounted `nodev`.
//!
//! Requires `CAP_SYS_ADMIN`. Without it, `unshare` fails with `EPERM`.

use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use devnode_sys::mount;
use rustix::fs::{CWD, Mode, OFlags};

use super::Acquire;
use crate::device::DeviceDescriptor;
use crate::error::AcquisitionError;
use crate::isolation::{DEFAULT_THREAD_NAME, IsolatedContext};
use crate::scan::{Scanner, is_directory};

pub const DEFAULT_NODE_NAME: &str = "devnode";
pub const DEFAULT_NODE_PERMISSIONS: u32 = 0o660;

/// Creates the requested node where nobody else can see it.
#[derive(Debug, Clone)]
pub struct TmpfsSynthesis {
    scan_root: PathBuf,
    scanner: Scanner,
    node_name: String,
    node_permissions: u32,
    thread_name: String,
}

impl TmpfsSynthesis {
    pub fn new(scan_root: impl Into<PathBuf>, scanner: Scanner) -> Self {
        Self {
            scan_root: scan_root.into(),
            scanner,
            node_name: DEFAULT_NODE_NAME.to_string(),
            node_permissions: DEFAULT_NODE_PERMISSIONS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = name.into();
        self
    }

    #[must_use]
    pub fn node_permissions(mut self, permissions: u32) -> Self {
        self.node_permissions = permissions;
        self
    }

    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Runs on the isolated thread only.
    fn synthesize(
        &self,
        device: &DeviceDescriptor,
        flags: OFlags,
    ) -> Result<OwnedFd, AcquisitionError> {
        mount::unshare_mount_namespace()?;
        mount::make_rprivate()?;

        let mount_point = self.scanner.find_first(&self.scan_root, is_directory)?;
        mount::mount_tmpfs(&mount_point).inspect_err(|errno| {
            tracing::warn!(
                mount_point = %mount_point.display(),
                %errno,
                "tmpfs mount failed; no other mount point is tried"
            );
        })?;
        tracing::debug!(mount_point = %mount_point.display(), "mounted private tmpfs");

        rustix::process::chdir(&mount_point)?;

        let node = Path::new(&self.node_name);
        rustix::fs::mknodat(
            CWD,
            node,
            device.kind().file_type(),
            Mode::from_raw_mode(device.permissions() | self.node_permissions),
            device.device_id(),
        )?;
        tracing::debug!(%device, node = %self.node_name, "created device node");

        Ok(rustix::fs::open(node, flags | OFlags::CLOEXEC, Mode::empty())?)
    }
}

impl Acquire for TmpfsSynthesis {
    fn acquire(
        &self,
        device: &DeviceDescriptor,
        flags: OFlags,
    ) -> Result<OwnedFd, AcquisitionError> {
        let this = self.clone();
        let device = *device;
        IsolatedContext::run(&self.thread_name, move || this.synthesize(&device, flags))
    }
}
