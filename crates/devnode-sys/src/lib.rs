//! Low-level Linux syscall wrappers for device node acquisition.
//!
//! This crate provides thin wrappers around the syscalls that rustix does not
//! cover in the form we need. For standard syscalls (open, mknod, stat, chdir),
//! use rustix directly.
//!
//! ## Modules
//!
//! - **mount** - Mount namespace isolation and tmpfs mounts
//! - **check** - Runtime detection of privileges and kernel support
//!
//! # Safety
//!
//! This crate contains raw syscall wrappers. Every `unsafe` block passes
//! pointers to NUL-terminated strings that outlive the call.

pub mod check;
pub mod mount;

use std::ffi::CStr;

pub use check::{CheckError, SystemInfo, check};

#[inline]
pub fn last_errno() -> rustix::io::Errno {
    // SAFETY: __errno_location always returns valid thread-local pointer.
    rustix::io::Errno::from_raw_os_error(unsafe { *libc::__errno_location() })
}

/// Standard description of an errno value, as `strerror` would print it.
pub fn describe_errno(errno: rustix::io::Errno) -> String {
    let code = errno.raw_os_error();
    let mut buf = [0 as libc::c_char; 256];
    // SAFETY: buf is writable for buf.len() bytes; the XSI variant NUL-terminates on success.
    let ret = unsafe { libc::strerror_r(code, buf.as_mut_ptr(), buf.len()) };
    if ret != 0 {
        return format!("Unknown error {code}");
    }
    // SAFETY: strerror_r succeeded, so buf holds a NUL-terminated string.
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}
