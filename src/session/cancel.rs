//! Cross-thread cancellation
//!
//! A [`CancelToken`] is handed to a running command. Cancelling it kills the
//! registered client process; its pipes close and the blocked read returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::process::ProcessHandle;

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    handle: Mutex<Option<Arc<dyn ProcessHandle>>>,
}

/// Cancellation handle shared between the caller and the running session
#[derive(Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the process of the command now running.
    ///
    /// Returns `false` when the token was already cancelled; the process is
    /// killed right away in that case.
    pub fn register(&self, handle: Arc<dyn ProcessHandle>) -> bool {
        let mut slot = self
            .state
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            drop(slot);
            if let Err(e) = handle.kill() {
                warn!("Failed to kill cancelled process {}: {}", handle.id(), e);
            }
            return false;
        }
        *slot = Some(handle);
        true
    }

    /// Detach the process once the command has finished
    pub fn unregister(&self) {
        self.state
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Cancel the command; safe to call from any thread, any number of times
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        let handle = self
            .state
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handle) = handle {
            debug!("Cancelling process {}", handle.id());
            if let Err(e) = handle.kill() {
                warn!("Failed to kill cancelled process {}: {}", handle.id(), e);
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
