//! Per-baker bake state, shared with cancellation handles.

use super::BakeError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct BakeSession {
    in_progress: AtomicBool,
    cancel_requested: AtomicBool,
}

impl BakeSession {
    /// Marks a bake as started. The bake ends when the returned guard is dropped.
    pub(crate) fn begin(&self) -> Result<BakeGuard<'_>, BakeError> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BakeError::BakeInProgress)?;

        // A request that raced with the end of the previous bake must not stop this one.
        self.cancel_requested.store(false, Ordering::Release);

        Ok(BakeGuard { session: self })
    }

    pub(crate) fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        if self.is_in_progress() {
            self.cancel_requested.store(true, Ordering::Release);
        }
    }
}

pub(crate) struct BakeGuard<'s> {
    session: &'s BakeSession,
}

impl BakeGuard<'_> {
    /// Returns `true` and clears the request if cancellation was requested since the last check.
    pub(crate) fn take_cancel_request(&self) -> bool {
        self.session.cancel_requested.swap(false, Ordering::AcqRel)
    }
}

impl Drop for BakeGuard<'_> {
    fn drop(&mut self) {
        self.session.in_progress.store(false, Ordering::Release);
    }
}

/// Cancels bakes of the baker it was obtained from, from any thread.
///
/// Cancellation is cooperative: the bake stops at the next boundary between dispatches,
/// after the current dispatch has been simulated and stored.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    pub(crate) session: Arc<BakeSession>,
}

impl CancelHandle {
    /// Requests cancellation of the running bake. Does nothing if no bake is in progress.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Returns `true` while a bake is running.
    pub fn is_bake_in_progress(&self) -> bool {
        self.session.is_in_progress()
    }
}
