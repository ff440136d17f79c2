//! Asynchronous front end.
//!
//! Acquisition blocks on directory scans, mounts and opens, so requests are
//! moved to tokio's blocking pool. Each request gets its own task; nothing is
//! shared between them except the process fd table.

use std::os::fd::OwnedFd;

use rustix::io::Errno;
use tokio::task;

use crate::error::AcquisitionError;
use crate::opener::{OpenRequest, Opener, RawRequest};

/// Acquire the device on the blocking pool.
pub async fn open(opener: Opener, request: OpenRequest) -> Result<OwnedFd, AcquisitionError> {
    run_blocking(move || opener.open(&request)).await
}

/// Validate and acquire an untyped request on the blocking pool.
///
/// Validation happens before the task is queued.
pub async fn open_raw(opener: Opener, raw: RawRequest) -> Result<OwnedFd, AcquisitionError> {
    let request = OpenRequest::try_from(raw)?;
    open(opener, request).await
}

async fn run_blocking<F>(f: F) -> Result<OwnedFd, AcquisitionError>
where
    F: FnOnce() -> Result<OwnedFd, AcquisitionError> + Send + 'static,
{
    task::spawn_blocking(f).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "acquisition task did not complete");
        Err(AcquisitionError::from_errno(Errno::CHILD))
    })
}
