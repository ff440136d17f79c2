//! Common utilities for acquisition tests.

use std::os::fd::OwnedFd;
use std::os::unix::fs::{FileTypeExt, MetadataExt, symlink};

use tempfile::TempDir;

/// /dev/zero
pub const ZERO: (u32, u32) = (1, 5);
/// /dev/null
pub const NULL: (u32, u32) = (1, 3);

/// A scratch device directory holding symlinks to host nodes.
///
/// The scanner follows symlinks, so `zero -> /dev/zero` looks like a
/// character device 1:5 without needing `mknod` privileges.
pub fn fake_dev(nodes: &[&str]) -> TempDir {
    let dir = TempDir::with_prefix("devnode-dev-").expect("create temp dir");
    for name in nodes {
        symlink(format!("/dev/{name}"), dir.path().join(name)).expect("create symlink");
    }
    dir
}

/// (major, minor) of the device behind an fd.
pub fn rdev(fd: &OwnedFd) -> (u32, u32) {
    let st = rustix::fs::fstat(fd).expect("fstat");
    (rustix::fs::major(st.st_rdev), rustix::fs::minor(st.st_rdev))
}

/// Whether this process may create transient nodes.
pub fn can_create_transient() -> bool {
    devnode_sys::check().is_ok_and(|info| info.can_create_transient())
}

/// Whether this process definitely lacks `CAP_SYS_ADMIN`.
#[allow(dead_code)]
pub fn unprivileged() -> bool {
    devnode_sys::check().is_ok_and(|info| !info.cap_sys_admin)
}

/// Name and (major, minor) of some block device directly under /dev.
#[allow(dead_code)]
pub fn host_block_device() -> Option<(String, u32, u32)> {
    std::fs::read_dir("/dev").ok()?.flatten().find_map(|entry| {
        let metadata = entry.metadata().ok()?;
        if !metadata.file_type().is_block_device() {
            return None;
        }
        let name = entry.file_name().into_string().ok()?;
        let rdev = metadata.rdev();
        Some((name, rustix::fs::major(rdev), rustix::fs::minor(rdev)))
    })
}
