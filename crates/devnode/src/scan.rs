//! Predicate-driven search over one directory.
//!
//! [`Scanner::find_first`] walks a directory in whatever order the kernel
//! enumerates it and returns the first entry whose metadata satisfies an
//! [`EntryMatcher`]. Candidate paths are built in a [`BoundedPath`], which
//! refuses to grow past the configured maximum instead of truncating.
//!
//! Entries are `stat`ed (symlinks followed). A failed `stat` aborts the whole
//! scan; it is not treated as a non-match.

use std::ffi::{OsStr, OsString};
use std::fs::{self, Metadata};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use crate::error::AcquisitionError;

/// Default maximum path length, including the terminating NUL.
pub const DEFAULT_MAX_PATH: usize = libc::PATH_MAX as usize;

/// Decides whether a directory entry is the one being looked for.
pub trait EntryMatcher {
    fn matches(&self, metadata: &Metadata) -> bool;
}

impl<F> EntryMatcher for F
where
    F: Fn(&Metadata) -> bool,
{
    fn matches(&self, metadata: &Metadata) -> bool {
        self(metadata)
    }
}

/// Matches any directory.
pub fn is_directory(metadata: &Metadata) -> bool {
    metadata.is_dir()
}

/// Path builder with a hard upper bound.
///
/// The bound counts a trailing NUL, so the longest accepted path is
/// `max - 1` bytes: the same contract as a fixed `char[max]` buffer.
#[derive(Debug, Clone)]
pub struct BoundedPath {
    buf: Vec<u8>,
    max: usize,
}

impl BoundedPath {
    pub fn new(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            max,
        }
    }

    /// Append raw bytes, failing with `CapacityExceeded` if they do not fit.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), AcquisitionError> {
        let needed = self
            .buf
            .len()
            .checked_add(bytes.len())
            .and_then(|n| n.checked_add(1))
            .ok_or_else(AcquisitionError::capacity_exceeded)?;
        if needed > self.max {
            return Err(AcquisitionError::capacity_exceeded());
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn as_path(&self) -> &Path {
        Path::new(OsStr::from_bytes(&self.buf))
    }

    pub fn into_path_buf(self) -> PathBuf {
        PathBuf::from(OsString::from_vec(self.buf))
    }
}

/// Linear directory search with a bounded result path.
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    max_path: usize,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATH)
    }
}

impl Scanner {
    pub fn new(max_path: usize) -> Self {
        Self { max_path }
    }

    /// Return `dir/<name>` of the first entry accepted by `matcher`.
    ///
    /// Fails with the OS error if the directory cannot be read or an entry
    /// cannot be `stat`ed, with `CapacityExceeded` if a candidate path does
    /// not fit, and with `NotFound` if nothing matches.
    pub fn find_first<M>(&self, dir: &Path, matcher: M) -> Result<PathBuf, AcquisitionError>
    where
        M: EntryMatcher,
    {
        // Dropping the iterator closes the directory on every return path.
        let entries = fs::read_dir(dir)?;

        // The prefix is only built once there is an entry to join.
        let mut path = BoundedPath::new(self.max_path);
        let mut prefix_len = None;

        for entry in entries {
            let entry = entry?;
            let base = match prefix_len {
                Some(len) => len,
                None => {
                    let dir_bytes = dir.as_os_str().as_bytes();
                    path.push(dir_bytes)?;
                    if !dir_bytes.ends_with(b"/") {
                        path.push(b"/")?;
                    }
                    *prefix_len.insert(path.len())
                }
            };
            path.truncate(base);
            path.push(entry.file_name().as_bytes())?;

            let metadata = fs::metadata(path.as_path())?;
            if matcher.matches(&metadata) {
                tracing::debug!(path = %path.as_path().display(), "scan matched");
                return Ok(path.into_path_buf());
            }
        }

        Err(AcquisitionError::not_found())
    }
}
