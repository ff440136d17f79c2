//! Error types for device acquisition.
//!
//! Every fallible step reports an [`AcquisitionError`]: the raw errno, its
//! standard description, and the [`ErrorKind`] the orchestrator decides on.
//! Only [`ErrorKind::from_errno`] looks at raw codes.

use std::io;

use rustix::io::Errno;
use thiserror::Error;

use crate::opener::Strategy;

/// Taxonomy of acquisition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The device is absent from the device directory.
    NotFound,
    /// Namespace isolation, mount or mknod needs a privilege the caller lacks.
    PermissionDenied,
    /// A scanned path would not fit in the configured maximum length.
    CapacityExceeded,
    /// The requested strategy (or operation) is not supported.
    NotSupported,
    /// Any other OS failure.
    OtherOsFailure,
}

impl ErrorKind {
    pub fn from_errno(errno: Errno) -> Self {
        if errno == Errno::NOENT {
            Self::NotFound
        } else if errno == Errno::PERM || errno == Errno::ACCESS {
            Self::PermissionDenied
        } else if errno == Errno::NAMETOOLONG {
            Self::CapacityExceeded
        } else if errno == Errno::NOSYS || errno == Errno::OPNOTSUPP {
            Self::NotSupported
        } else {
            Self::OtherOsFailure
        }
    }
}

/// A failed acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AcquisitionError {
    kind: ErrorKind,
    errno: Errno,
    message: String,
    strategy: Option<Strategy>,
}

impl AcquisitionError {
    pub fn from_errno(errno: Errno) -> Self {
        Self {
            kind: ErrorKind::from_errno(errno),
            errno,
            message: devnode_sys::describe_errno(errno),
            strategy: None,
        }
    }

    pub(crate) fn not_found() -> Self {
        Self::from_errno(Errno::NOENT)
    }

    pub(crate) fn capacity_exceeded() -> Self {
        Self::from_errno(Errno::NAMETOOLONG)
    }

    pub(crate) fn not_supported() -> Self {
        Self::from_errno(Errno::NOSYS)
    }

    /// Tag the error with the strategy that produced it. Keeps an existing tag.
    pub(crate) fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy.get_or_insert(strategy);
        self
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn errno(&self) -> Errno {
        self.errno
    }

    #[inline]
    pub fn raw_os_error(&self) -> i32 {
        self.errno.raw_os_error()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Strategy that was running when the error occurred, if known.
    #[inline]
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<Errno> for AcquisitionError {
    fn from(errno: Errno) -> Self {
        Self::from_errno(errno)
    }
}

impl From<io::Error> for AcquisitionError {
    fn from(e: io::Error) -> Self {
        Self::from_errno(Errno::from_io_error(&e).unwrap_or(Errno::IO))
    }
}

impl From<AcquisitionError> for io::Error {
    fn from(e: AcquisitionError) -> Self {
        io::Error::from_raw_os_error(e.raw_os_error())
    }
}

/// Invalid textual input for a request field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported device type \"{0}\", expected \"character\" or \"block\"")]
    DeviceType(String),

    #[error("invalid flags \"{0}\", only \"r\", \"w\" and \"r+\" supported")]
    Access(String),

    #[error("unsupported strategy \"{0}\"")]
    Strategy(String),
}
