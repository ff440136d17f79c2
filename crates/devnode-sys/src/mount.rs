//! Mount namespace isolation and transient mounts.
//!
//! All of these mutate namespace state of the calling thread. Call them only
//! from a thread that has already unshared its mount namespace (or is about
//! to, in the case of [`unshare_mount_namespace`]), never from a thread whose
//! view of the filesystem other code depends on.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use rustix::io::Errno;

use crate::last_errno;

/// Give the calling thread its own mount namespace and filesystem attributes.
///
/// `CLONE_FS` detaches cwd and root from the sibling threads so a later
/// `chdir` stays local to this thread.
pub fn unshare_mount_namespace() -> Result<(), Errno> {
    // SAFETY: unshare takes no pointers.
    let ret = unsafe { libc::unshare(libc::CLONE_NEWNS | libc::CLONE_FS) };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

/// Make all mounts private recursively.
pub fn make_rprivate() -> Result<(), Errno> {
    // SAFETY: the target is a static C string, the other pointers are null.
    let ret = unsafe {
        libc::mount(
            std::ptr::null(),
            c"/".as_ptr(),
            std::ptr::null(),
            libc::MS_REC | libc::MS_PRIVATE,
            std::ptr::null(),
        )
    };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

/// Mount an empty tmpfs at `target`.
pub fn mount_tmpfs(target: &Path) -> Result<(), Errno> {
    let target_c = path_to_cstring(target)?;

    // SAFETY: all strings are NUL-terminated and outlive the call; data is null.
    let ret = unsafe {
        libc::mount(
            c"none".as_ptr(),
            target_c.as_ptr(),
            c"tmpfs".as_ptr(),
            0,
            std::ptr::null(),
        )
    };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

#[inline]
fn path_to_cstring(path: &Path) -> Result<CString, Errno> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::INVAL)
}
