//! Drive-cycle scheduling.
//!
//! In autonomous mode the engine spawns [`run_cadence`], which wakes on the
//! poll interval or as soon as new input is recorded, whichever comes first.
//! The engine's own rate limit keeps cycles at least one interval apart.
//!
//! In synchronous mode nothing is spawned; the host awaits a [`WakeHandle`]
//! and calls [`InputEngine::poll_cycle`] from its own loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, error, trace};

use crate::application::engine::InputEngine;

/// Signal raised whenever a contact is recorded or the channel becomes ready.
#[derive(Debug, Clone)]
pub struct WakeHandle(Arc<Notify>);

impl WakeHandle {
    pub(crate) fn new(notify: Arc<Notify>) -> Self {
        Self(notify)
    }

    /// Waits until the next signal.
    pub async fn notified(&self) {
        self.0.notified().await;
    }

    /// Waits for a signal for at most `timeout`.  Returns `true` if woken by a
    /// signal rather than the timeout.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.0.notified()).await.is_ok()
    }
}

/// Cadence task body.  Exits when the engine stops running or a cycle fails.
pub(crate) async fn run_cadence(engine: Arc<InputEngine>) {
    let interval = engine.options().poll_interval;
    debug!(interval_ms = interval.as_millis() as u64, "cadence task started");

    loop {
        let _ = time::timeout(interval, engine.wake().notified()).await;
        if !engine.is_running() {
            break;
        }

        match engine.poll_cycle().await {
            Ok(outcome) => trace!(?outcome, "drive cycle finished"),
            Err(e) => {
                error!("cadence task stopping: {e}");
                break;
            }
        }
    }

    debug!("cadence task stopped");
}
