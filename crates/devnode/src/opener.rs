//! Strategy selection and fallback.
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | `Auto` | Look up in the device directory; on `NotFound` only, synthesize |
//! | `SearchExisting` | Look up only |
//! | `CreateTransient` | Synthesize only |
//!
//! Any error other than a lookup `NotFound` under `Auto` is returned as is.

use std::fmt;
use std::fs::File;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::str::FromStr;

use rustix::fs::OFlags;
use rustix::io::Errno;

use crate::device::{Access, DeviceDescriptor};
use crate::error::{AcquisitionError, ErrorKind, ParseError};
use crate::isolation::DEFAULT_THREAD_NAME;
use crate::scan::{DEFAULT_MAX_PATH, Scanner};
use crate::strategy::{
    Acquire, DEFAULT_NODE_NAME, DEFAULT_NODE_PERMISSIONS, DevLookup, TmpfsSynthesis,
};

/// How to obtain the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Search the device directory, fall back to `CreateTransient` if absent.
    #[default]
    Auto,
    /// Search the device directory only.
    ///
    /// Can miss hotplugged devices when the directory is not kept in sync,
    /// as in containers where `/dev` is populated once at start.
    SearchExisting,
    /// Create the node on a private tmpfs. Requires `CAP_SYS_ADMIN`.
    CreateTransient,
}

impl Strategy {
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Auto => 0,
            Self::SearchExisting => 1,
            Self::CreateTransient => 2,
        }
    }
}

impl TryFrom<i32> for Strategy {
    type Error = AcquisitionError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Auto),
            1 => Ok(Self::SearchExisting),
            2 => Ok(Self::CreateTransient),
            _ => Err(AcquisitionError::not_supported()),
        }
    }
}

impl FromStr for Strategy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" | "METHOD_AUTO" => Ok(Self::Auto),
            "search" | "METHOD_SEARCH_IN_DEV" => Ok(Self::SearchExisting),
            "tmpfs" | "METHOD_MOUNT_NAMESPACE_TMPFS" => Ok(Self::CreateTransient),
            _ => Err(ParseError::Strategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::SearchExisting => f.write_str("search"),
            Self::CreateTransient => f.write_str("tmpfs"),
        }
    }
}

/// A validated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRequest {
    pub device: DeviceDescriptor,
    pub flags: OFlags,
    pub strategy: Strategy,
}

impl OpenRequest {
    pub fn new(device: DeviceDescriptor, access: Access) -> Self {
        Self {
            device,
            flags: access.oflags(),
            strategy: Strategy::default(),
        }
    }

    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Extra open flags, e.g. `OFlags::NONBLOCK`.
    #[must_use]
    pub fn flags(mut self, flags: OFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// A request as it arrives from an untyped call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRequest {
    /// `S_IFCHR` or `S_IFBLK`, optionally with permission bits.
    pub type_bits: u32,
    pub major: u32,
    pub minor: u32,
    pub flags: i32,
    /// 0 = auto, 1 = search existing, 2 = create transient.
    pub strategy: i32,
}

impl TryFrom<RawRequest> for OpenRequest {
    type Error = AcquisitionError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let strategy = Strategy::try_from(raw.strategy)?;
        let device = DeviceDescriptor::from_mode(raw.type_bits, raw.major, raw.minor)
            .ok_or_else(|| AcquisitionError::from_errno(Errno::INVAL))?;
        Ok(Self {
            device,
            flags: OFlags::from_bits_retain(raw.flags as _),
            strategy,
        })
    }
}

/// Configured entry point for device acquisition.
///
/// ```ignore
/// use devnode::{Access, DeviceDescriptor, OpenRequest, Opener};
///
/// let zero = OpenRequest::new(DeviceDescriptor::character(1, 5), Access::Read);
/// let file = Opener::new().open_file(&zero)?;
/// ```
#[derive(Debug, Clone)]
pub struct Opener {
    dev_dir: PathBuf,
    scan_root: PathBuf,
    max_path: usize,
    node_name: String,
    node_permissions: u32,
    thread_name: String,
}

impl Default for Opener {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            scan_root: PathBuf::from("/"),
            max_path: DEFAULT_MAX_PATH,
            node_name: DEFAULT_NODE_NAME.to_string(),
            node_permissions: DEFAULT_NODE_PERMISSIONS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl Opener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched for existing nodes.
    #[must_use]
    pub fn dev_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dir.into();
        self
    }

    /// Directory whose first subdirectory becomes the tmpfs mount point.
    #[must_use]
    pub fn scan_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scan_root = dir.into();
        self
    }

    /// Maximum length of a scanned path, terminator included.
    #[must_use]
    pub fn max_path(mut self, max: usize) -> Self {
        self.max_path = max;
        self
    }

    #[must_use]
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = name.into();
        self
    }

    /// Permission bits added to synthesized nodes.
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

    pub fn lookup(&self) -> DevLookup {
        DevLookup::new(&self.dev_dir, Scanner::new(self.max_path))
    }

    pub fn synthesis(&self) -> TmpfsSynthesis {
        TmpfsSynthesis::new(&self.scan_root, Scanner::new(self.max_path))
            .node_name(&self.node_name)
            .node_permissions(self.node_permissions)
            .thread_name(&self.thread_name)
    }

    /// Acquire an fd for the request. Blocks.
    pub fn open(&self, request: &OpenRequest) -> Result<OwnedFd, AcquisitionError> {
        acquire_with(&self.lookup(), &self.synthesis(), request)
    }

    /// Validate an untyped request, then acquire.
    pub fn open_raw(&self, raw: RawRequest) -> Result<OwnedFd, AcquisitionError> {
        let request = OpenRequest::try_from(raw)?;
        self.open(&request)
    }

    pub fn open_file(&self, request: &OpenRequest) -> Result<File, AcquisitionError> {
        self.open(request).map(File::from)
    }
}

/// Apply the fallback policy over two strategies.
pub fn acquire_with<L, S>(
    lookup: &L,
    synthesis: &S,
    request: &OpenRequest,
) -> Result<OwnedFd, AcquisitionError>
where
    L: Acquire,
    S: Acquire,
{
    let OpenRequest {
        device,
        flags,
        strategy,
    } = *request;
    tracing::debug!(%device, %strategy, "acquiring device");

    match strategy {
        Strategy::SearchExisting => lookup
            .acquire(&device, flags)
            .map_err(|e| e.with_strategy(Strategy::SearchExisting)),
        Strategy::CreateTransient => synthesis
            .acquire(&device, flags)
            .map_err(|e| e.with_strategy(Strategy::CreateTransient)),
        Strategy::Auto => match lookup.acquire(&device, flags) {
            Ok(fd) => Ok(fd),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(%device, "not in device directory, creating transient node");
                synthesis
                    .acquire(&device, flags)
                    .map_err(|e| e.with_strategy(Strategy::CreateTransient))
            }
            Err(e) => Err(e.with_strategy(Strategy::SearchExisting)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Scripted {
        outcome: Option<Errno>,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn ok() -> Self {
            Self {
                outcome: None,
                calls: Cell::new(0),
            }
        }

        fn fail(errno: Errno) -> Self {
            Self {
                outcome: Some(errno),
                calls: Cell::new(0),
            }
        }
    }

    impl Acquire for Scripted {
        fn acquire(
            &self,
            _device: &DeviceDescriptor,
            _flags: OFlags,
        ) -> Result<OwnedFd, AcquisitionError> {
            self.calls.set(self.calls.get() + 1);
            match self.outcome {
                None => Ok(tempfile::tempfile()?.into()),
                Some(errno) => Err(errno.into()),
            }
        }
    }

    fn request(strategy: Strategy) -> OpenRequest {
        OpenRequest::new(DeviceDescriptor::character(1, 5), Access::Read).strategy(strategy)
    }

    #[test]
    fn auto_uses_lookup_when_found() {
        let (lookup, synth) = (Scripted::ok(), Scripted::fail(Errno::PERM));
        assert!(acquire_with(&lookup, &synth, &request(Strategy::Auto)).is_ok());
        assert_eq!(lookup.calls.get(), 1);
        assert_eq!(synth.calls.get(), 0);
    }

    #[test]
    fn auto_falls_back_on_not_found() {
        let (lookup, synth) = (Scripted::fail(Errno::NOENT), Scripted::ok());
        assert!(acquire_with(&lookup, &synth, &request(Strategy::Auto)).is_ok());
        assert_eq!(lookup.calls.get(), 1);
        assert_eq!(synth.calls.get(), 1);
    }

    #[test]
    fn auto_returns_synthesis_error_after_fallback() {
        let (lookup, synth) = (Scripted::fail(Errno::NOENT), Scripted::fail(Errno::PERM));
        let err = acquire_with(&lookup, &synth, &request(Strategy::Auto)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.strategy(), Some(Strategy::CreateTransient));
    }

    #[test]
    fn auto_does_not_fall_back_on_other_errors() {
        for errno in [Errno::ACCESS, Errno::NAMETOOLONG, Errno::IO] {
            let (lookup, synth) = (Scripted::fail(errno), Scripted::ok());
            let err = acquire_with(&lookup, &synth, &request(Strategy::Auto)).unwrap_err();
            assert_eq!(err.errno(), errno);
            assert_eq!(err.strategy(), Some(Strategy::SearchExisting));
            assert_eq!(synth.calls.get(), 0);
        }
    }

    #[test]
    fn search_existing_never_synthesizes() {
        let (lookup, synth) = (Scripted::fail(Errno::NOENT), Scripted::ok());
        let err = acquire_with(&lookup, &synth, &request(Strategy::SearchExisting)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(synth.calls.get(), 0);
    }

    #[test]
    fn create_transient_never_looks_up() {
        let (lookup, synth) = (Scripted::ok(), Scripted::fail(Errno::PERM));
        let err = acquire_with(&lookup, &synth, &request(Strategy::CreateTransient)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(lookup.calls.get(), 0);
        assert_eq!(synth.calls.get(), 1);
    }

    #[test]
    fn strategy_from_raw() {
        assert_eq!(Strategy::try_from(0), Ok(Strategy::Auto));
        assert_eq!(Strategy::try_from(1), Ok(Strategy::SearchExisting));
        assert_eq!(Strategy::try_from(2), Ok(Strategy::CreateTransient));
        for raw in [3, -1, i32::MAX] {
            let err = Strategy::try_from(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotSupported);
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!("auto".parse(), Ok(Strategy::Auto));
        assert_eq!("METHOD_SEARCH_IN_DEV".parse(), Ok(Strategy::SearchExisting));
        assert_eq!("tmpfs".parse(), Ok(Strategy::CreateTransient));
        assert!("udev".parse::<Strategy>().is_err());
        for s in [Strategy::Auto, Strategy::SearchExisting, Strategy::CreateTransient] {
            assert_eq!(s.to_string().parse(), Ok(s));
            assert_eq!(Strategy::try_from(s.as_raw()), Ok(s));
        }
    }

    #[test]
    fn raw_request_validation() {
        let raw = RawRequest {
            type_bits: libc::S_IFCHR,
            major: 1,
            minor: 5,
            flags: libc::O_RDWR,
            strategy: 1,
        };
        let request = OpenRequest::try_from(raw).unwrap();
        assert_eq!(request.device, DeviceDescriptor::character(1, 5));
        assert_eq!(request.flags, OFlags::RDWR);
        assert_eq!(request.strategy, Strategy::SearchExisting);

        let err = OpenRequest::try_from(RawRequest { strategy: 3, ..raw }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);

        let err = OpenRequest::try_from(RawRequest {
            type_bits: libc::S_IFREG,
            ..raw
        })
        .unwrap_err();
        assert_eq!(err.errno(), Errno::INVAL);
    }

    #[test]
    fn unknown_strategy_rejected_before_type_check() {
        let raw = RawRequest {
            type_bits: 0,
            major: 0,
            minor: 0,
            flags: 0,
            strategy: 9,
        };
        let err = OpenRequest::try_from(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }

    #[test]
    fn request_builder_adds_flags() {
        let request = OpenRequest::new(DeviceDescriptor::character(1, 3), Access::Write)
            .flags(OFlags::NONBLOCK);
        assert_eq!(request.flags, OFlags::WRONLY | OFlags::NONBLOCK);
        assert_eq!(request.strategy, Strategy::Auto);
    }
}
