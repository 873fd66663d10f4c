//! Recording control handler for integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::application::host::TouchControlHandler;

/// Counts callback invocations.  With `should_fail` set, both callbacks
/// return an error after counting.
#[derive(Debug, Default)]
pub struct RecordingControlHandler {
    pub suspend_calls: AtomicUsize,
    pub resume_calls: AtomicUsize,
    pub should_fail: AtomicBool,
}

impl RecordingControlHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend_calls(&self) -> usize {
        self.suspend_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<(), String> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err("mock callback failure".to_string())
        } else {
            Ok(())
        }
    }
}

impl TouchControlHandler for RecordingControlHandler {
    fn suspend_touch(&self) -> Result<(), String> {
        self.suspend_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }

    fn resume_touch(&self) -> Result<(), String> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }
}
