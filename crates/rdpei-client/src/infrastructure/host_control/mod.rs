//! [`TouchControlHandler`] implementations.

pub mod mock;

use std::sync::Arc;

use tracing::info;

use crate::application::host::{HostSession, TouchControlHandler};

/// Handler that mirrors the peer's suspend/resume requests into the shared
/// [`HostSession`], so the next drive cycle honours them.
#[derive(Debug, Clone)]
pub struct SessionControlHandler {
    host: Arc<HostSession>,
}

impl SessionControlHandler {
    pub fn new(host: Arc<HostSession>) -> Self {
        Self { host }
    }
}

impl TouchControlHandler for SessionControlHandler {
    fn suspend_touch(&self) -> Result<(), String> {
        info!("host input suspended by peer");
        self.host.set_input_suspended(true);
        Ok(())
    }

    fn resume_touch(&self) -> Result<(), String> {
        info!("host input resumed by peer");
        self.host.set_input_suspended(false);
        Ok(())
    }
}
