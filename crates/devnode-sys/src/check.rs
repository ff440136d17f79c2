//! Host capability checking.
//!
//! Reports whether the current process can synthesize device nodes in a
//! private mount namespace. The check is performed once and cached in a
//! static `OnceLock`.
//!
//! | Feature | Check Method |
//! |---------|--------------|
//! | Kernel version | `uname` syscall |
//! | `CAP_SYS_ADMIN` | `CapEff` in `/proc/self/status` |
//! | Mount namespaces | `/proc/self/ns/mnt` exists |
//!
//! ## Usage
//!
//! ```ignore
//! match devnode_sys::check() {
//!     Ok(info) if info.can_create_transient() => println!("tmpfs strategy available"),
//!     Ok(_) => println!("lookup only"),
//!     Err(e) => eprintln!("check failed: {e}"),
//! }
//! ```

use std::path::Path;
use std::sync::OnceLock;

use rustix::system::uname;
use thiserror::Error;

const CAP_SYS_ADMIN: u32 = 21;

/// What the host allows this process to do.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub kernel_version: (u32, u32, u32),
    pub cap_sys_admin: bool,
    pub mount_namespaces: bool,
}

impl SystemInfo {
    /// Whether the namespace + tmpfs strategy can be expected to succeed.
    pub fn can_create_transient(&self) -> bool {
        self.cap_sys_admin && self.mount_namespaces
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckError {
    #[error("failed to read kernel version")]
    KernelVersionReadFailed,

    #[error("failed to read capabilities: {0}")]
    CapabilitiesUnavailable(String),
}

static SYSTEM_INFO: OnceLock<Result<SystemInfo, CheckError>> = OnceLock::new();

/// Check host capabilities and cache the result.
pub fn check() -> Result<&'static SystemInfo, &'static CheckError> {
    SYSTEM_INFO.get_or_init(check_impl).as_ref()
}

fn check_impl() -> Result<SystemInfo, CheckError> {
    let kernel_version = get_kernel_version()?;

    let status = std::fs::read_to_string("/proc/self/status")
        .map_err(|e| CheckError::CapabilitiesUnavailable(e.to_string()))?;
    let cap_eff = parse_cap_eff(&status).ok_or_else(|| {
        CheckError::CapabilitiesUnavailable("no CapEff line in /proc/self/status".into())
    })?;

    Ok(SystemInfo {
        kernel_version,
        cap_sys_admin: cap_eff & (1 << CAP_SYS_ADMIN) != 0,
        mount_namespaces: Path::new("/proc/self/ns/mnt").exists(),
    })
}

fn get_kernel_version() -> Result<(u32, u32, u32), CheckError> {
    let uts = uname();
    let release = uts
        .release()
        .to_str()
        .map_err(|_| CheckError::KernelVersionReadFailed)?;
    parse_kernel_version(release)
}

fn parse_kernel_version(release: &str) -> Result<(u32, u32, u32), CheckError> {
    let mut parts = release.split('.');

    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or(CheckError::KernelVersionReadFailed)?;
    let minor = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or(CheckError::KernelVersionReadFailed)?;
    // Patch might have additional suffix like "0-generic"
    let patch = parts
        .next()
        .and_then(|p| p.split('-').next())
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    Ok((major, minor, patch))
}

fn parse_cap_eff(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("CapEff:"))
        .and_then(|hex| u64::from_str_radix(hex.trim(), 16).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kernel_version() {
        assert_eq!(parse_kernel_version("5.15.0").unwrap(), (5, 15, 0));
        assert_eq!(parse_kernel_version("6.1.0-generic").unwrap(), (6, 1, 0));
        assert_eq!(
            parse_kernel_version("5.4.0-150-generic").unwrap(),
            (5, 4, 0)
        );
        assert_eq!(parse_kernel_version("6.8").unwrap(), (6, 8, 0));
        assert!(parse_kernel_version("garbage").is_err());
    }

    #[test]
    fn test_parse_cap_eff() {
        let root = "Name:\tcat\nCapInh:\t0000000000000000\nCapEff:\t000001ffffffffff\n";
        let cap = parse_cap_eff(root).unwrap();
        assert_ne!(cap & (1 << CAP_SYS_ADMIN), 0);

        let user = "CapPrm:\t0000000000000000\nCapEff:\t0000000000000000\n";
        assert_eq!(parse_cap_eff(user), Some(0));

        assert_eq!(parse_cap_eff("Name:\tcat\n"), None);
    }

    #[test]
    fn test_check() {
        match check() {
            Ok(info) => {
                assert_eq!(
                    info.mount_namespaces,
                    Path::new("/proc/self/ns/mnt").exists()
                );
                assert!(info.kernel_version >= (2, 6, 0));
                assert_eq!(
                    info.can_create_transient(),
                    info.cap_sys_admin && info.mount_namespaces
                );
                // Cached: a second call returns the same value.
                assert!(std::ptr::eq(check().unwrap(), info));
            }
            Err(e) => println!("Skipping: system check failed: {e}"),
        }
    }
}
