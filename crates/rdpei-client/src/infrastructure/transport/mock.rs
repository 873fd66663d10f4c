//! Recording transport for tests.
//!
//! Every accepted write is pushed into `writes` so assertions can decode and
//! inspect exactly what the engine sent, in order.  Call
//! [`RecordingTransport::fail_writes`] to make later writes fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rdpei_core::protocol::messages::{PenEventPdu, TouchEventPdu};
use rdpei_core::{decode_pdu, RdpeiPdu};

use crate::application::engine::{ChannelTransport, TransportError};

#[derive(Debug, Default)]
pub struct RecordingTransport {
    /// Raw bytes of every successful write.
    pub writes: Mutex<Vec<Vec<u8>>>,
    should_fail: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every later write returns [`TransportError::Write`].
    pub fn fail_writes(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Decodes every recorded write.  Panics on undecodable bytes.
    pub fn pdus(&self) -> Vec<RdpeiPdu> {
        self.writes()
            .iter()
            .map(|bytes| decode_pdu(bytes).unwrap().0)
            .collect()
    }

    pub fn touch_frames(&self) -> Vec<TouchEventPdu> {
        self.pdus()
            .into_iter()
            .filter_map(|pdu| match pdu {
                RdpeiPdu::Touch(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn pen_frames(&self) -> Vec<PenEventPdu> {
        self.pdus()
            .into_iter()
            .filter_map(|pdu| match pdu {
                RdpeiPdu::Pen(event) => Some(event),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    async fn write(&self, pdu: &[u8]) -> Result<(), TransportError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(TransportError::Write("mock write failure".to_string()));
        }
        self.writes.lock().unwrap().push(pdu.to_vec());
        Ok(())
    }
}
