//! Host-owned session flags and callbacks.
//!
//! The engine reads these but never decides them: the host toggles
//! `input_suspended` (usually in response to the suspend/resume callbacks)
//! and chooses which CS_READY flags may be advertised.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Callbacks the engine invokes when the peer suspends or resumes input.
///
/// Implementations must not block; they run on the task that received the
/// control PDU.
#[cfg_attr(test, mockall::automock)]
pub trait TouchControlHandler: Send + Sync {
    /// The peer asked the host to stop sending touch and pen input.
    fn suspend_touch(&self) -> Result<(), String>;

    /// The peer asked the host to resume sending input.
    fn resume_touch(&self) -> Result<(), String>;
}

/// Flags shared between the host and the engine.
#[derive(Debug)]
pub struct HostSession {
    input_suspended: AtomicBool,
    feature_mask: AtomicU32,
}

/// Copy of the host flags taken at the start of a drive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFlags {
    pub input_suspended: bool,
    pub feature_mask: u32,
}

impl Default for HostSession {
    fn default() -> Self {
        Self::new(u32::MAX)
    }
}

impl HostSession {
    pub fn new(feature_mask: u32) -> Self {
        Self {
            input_suspended: AtomicBool::new(false),
            feature_mask: AtomicU32::new(feature_mask),
        }
    }

    pub fn input_suspended(&self) -> bool {
        self.input_suspended.load(Ordering::Acquire)
    }

    pub fn set_input_suspended(&self, suspended: bool) {
        self.input_suspended.store(suspended, Ordering::Release);
    }

    pub fn feature_mask(&self) -> u32 {
        self.feature_mask.load(Ordering::Acquire)
    }

    pub fn set_feature_mask(&self, mask: u32) {
        self.feature_mask.store(mask, Ordering::Release);
    }

    pub fn snapshot(&self) -> HostFlags {
        HostFlags {
            input_suspended: self.input_suspended(),
            feature_mask: self.feature_mask(),
        }
    }
}
