//! Shared observable state between a worker task and the tick loop.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress and completion flags a worker task publishes and the runner
/// reads. All fields are monotonic within one worker lifetime.
#[derive(Debug, Default)]
pub(crate) struct WorkerState {
    finished: AtomicBool,
    bytes_total: AtomicU64,
    bytes_done: AtomicU64,
    error: Mutex<Option<String>>,
}

impl WorkerState {
    pub(crate) fn with_expected_bytes(bytes_total: u64) -> Self {
        let state = Self::default();
        state.bytes_total.store(bytes_total, Ordering::Relaxed);
        state
    }

    pub(crate) fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Mark the worker finished, recording the error when one occurred.
    pub(crate) fn complete(&self, error: Option<String>) {
        if let Some(message) = error {
            self.set_error(message);
        }
        self.finished.store(true, Ordering::Release);
    }

    pub(crate) fn error(&self) -> Option<String> {
        self.lock_error().clone()
    }

    pub(crate) fn set_error(&self, message: String) {
        let mut guard = self.lock_error();
        if guard.is_none() {
            *guard = Some(message);
        }
    }

    pub(crate) fn bytes_total(&self) -> u64 {
        self.bytes_total.load(Ordering::Relaxed)
    }

    pub(crate) fn set_bytes_total(&self, bytes: u64) {
        self.bytes_total.store(bytes, Ordering::Relaxed);
    }

    pub(crate) fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }

    pub(crate) fn set_bytes_done(&self, bytes: u64) {
        self.bytes_done.store(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_done(&self, bytes: u64) {
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
    }

    fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        match self.error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_counters_accumulate() {
        let state = WorkerState::with_expected_bytes(100);
        assert_eq!(state.bytes_total(), 100);
        state.add_bytes_done(40);
        state.add_bytes_done(20);
        assert_eq!(state.bytes_done(), 60);
        state.set_bytes_done(90);
        assert_eq!(state.bytes_done(), 90);
    }

    #[test]
    fn completion_keeps_first_error() {
        let state = WorkerState::default();
        assert!(!state.finished());
        state.complete(Some("first".to_string()));
        state.set_error("second".to_string());
        assert!(state.finished());
        assert_eq!(state.error().as_deref(), Some("first"));
    }

    #[test]
    fn clean_completion_has_no_error() {
        let state = WorkerState::default();
        state.complete(None);
        assert!(state.finished());
        assert!(state.error().is_none());
    }
}
