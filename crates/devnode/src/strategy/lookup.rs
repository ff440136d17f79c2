use std::fs::Metadata;
use std::os::fd::OwnedFd;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use rustix::fs::{Mode, OFlags};

use super::Acquire;
use crate::device::DeviceDescriptor;
use crate::error::AcquisitionError;
use crate::scan::Scanner;

/// Opens a node that already exists in the device directory.
///
/// The directory is searched one level deep; nodes in subdirectories such as
/// `/dev/net/tun` are not found.
#[derive(Debug, Clone)]
pub struct DevLookup {
    dev_dir: PathBuf,
    scanner: Scanner,
}

impl DevLookup {
    pub fn new(dev_dir: impl Into<PathBuf>, scanner: Scanner) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            scanner,
        }
    }

    #[inline]
    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }

    /// Path of the first matching node.
    pub fn locate(&self, device: &DeviceDescriptor) -> Result<PathBuf, AcquisitionError> {
        self.scanner.find_first(&self.dev_dir, |metadata: &Metadata| {
            device.matches(metadata.mode(), metadata.rdev())
        })
    }
}

impl Acquire for DevLookup {
    fn acquire(
        &self,
        device: &DeviceDescriptor,
        flags: OFlags,
    ) -> Result<OwnedFd, AcquisitionError> {
        let path = self.locate(device)?;
        tracing::debug!(%device, path = %path.display(), "opening existing node");
        Ok(rustix::fs::open(&path, flags | OFlags::CLOEXEC, Mode::empty())?)
    }
}
