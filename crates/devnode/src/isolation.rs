//! Dedicated threads for namespace mutation.
//!
//! `unshare(CLONE_NEWNS | CLONE_FS)` only affects the calling thread, so the
//! tmpfs strategy never runs on a caller's thread. An [`IsolatedContext`]
//! spawns a fresh thread, runs one closure on it and is joined before the
//! outcome is handed back. When the thread exits, its private mount
//! namespace goes with it (mounts stay alive only as long as an fd into them).
//!
//! ```ignore
//! let outcome = IsolatedContext::spawn("devnode-isolated", || {
//!     devnode_sys::mount::unshare_mount_namespace()?;
//!     Ok(42)
//! })?
//! .join();
//! ```

use std::thread::{self, JoinHandle};

use rustix::io::Errno;

use crate::error::AcquisitionError;

pub const DEFAULT_THREAD_NAME: &str = "devnode-isolated";

/// A running isolated thread.
#[derive(Debug)]
#[must_use = "an isolated context must be joined"]
pub struct IsolatedContext<T> {
    handle: JoinHandle<Result<T, AcquisitionError>>,
}

impl<T> IsolatedContext<T>
where
    T: Send + 'static,
{
    /// Spawn a thread running `f`.
    pub fn spawn<F>(name: &str, f: F) -> Result<Self, AcquisitionError>
    where
        F: FnOnce() -> Result<T, AcquisitionError> + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(f)?;
        Ok(Self { handle })
    }

    /// Wait for the thread and return what the closure returned.
    ///
    /// A panicking closure is reported as `ECHILD`.
    pub fn join(self) -> Result<T, AcquisitionError> {
        self.handle.join().unwrap_or_else(|_| {
            tracing::warn!("isolated thread panicked");
            Err(AcquisitionError::from_errno(Errno::CHILD))
        })
    }

    /// Spawn, run to completion and join.
    pub fn run<F>(name: &str, f: F) -> Result<T, AcquisitionError>
    where
        F: FnOnce() -> Result<T, AcquisitionError> + Send + 'static,
    {
        Self::spawn(name, f)?.join()
    }
}
