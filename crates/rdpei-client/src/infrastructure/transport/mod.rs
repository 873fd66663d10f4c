//! [`ChannelTransport`] implementations.
//!
//! PDUs carry their own length in the header, so any byte stream can carry
//! them back to back without extra framing.
//!
//! - [`StreamTransport`] writes PDUs to a Tokio [`AsyncWrite`] (a TCP stream,
//!   a capture file, a pipe).
//! - [`LoggingTransport`] decodes each PDU and logs it instead of sending it.
//!   Used by the demo binary when no capture file is configured.
//! - [`mock::RecordingTransport`] records writes for tests.

pub mod mock;

use std::io::ErrorKind;

use async_trait::async_trait;
use rdpei_core::{decode_pdu, RdpeiPdu};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::engine::{ChannelTransport, TransportError};

/// Writes every PDU to an async byte sink.
pub struct StreamTransport<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> StreamTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ChannelTransport for StreamTransport<W> {
    async fn write(&self, pdu: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(pdu).await.map_err(closed_or_io)?;
        writer.flush().await.map_err(closed_or_io)?;
        Ok(())
    }
}

fn closed_or_io(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::WriteZero => {
            TransportError::Closed
        }
        _ => TransportError::Io(e),
    }
}

/// Logs a one-line summary of every PDU at info level.
#[derive(Debug, Default)]
pub struct LoggingTransport;

impl LoggingTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelTransport for LoggingTransport {
    async fn write(&self, pdu: &[u8]) -> Result<(), TransportError> {
        match decode_pdu(pdu) {
            Ok((decoded, _)) => info!(len = pdu.len(), "-> {}", summarize(&decoded)),
            Err(e) => warn!(len = pdu.len(), "-> undecodable PDU: {e}"),
        }
        Ok(())
    }
}

fn summarize(pdu: &RdpeiPdu) -> String {
    match pdu {
        RdpeiPdu::CsReady(reply) => format!(
            "CS_READY version={:#010x} flags={:#x}",
            reply.protocol_version, reply.flags
        ),
        RdpeiPdu::Touch(event) => {
            let contacts: Vec<String> = event
                .frames
                .iter()
                .flat_map(|f| f.contacts.iter())
                .map(|c| format!("#{}({},{}) {:#x}", c.contact_id, c.x, c.y, c.contact_flags.bits()))
                .collect();
            format!("TOUCH encode_time={} [{}]", event.encode_time, contacts.join(" "))
        }
        RdpeiPdu::Pen(event) => {
            let contacts: Vec<String> = event
                .frames
                .iter()
                .flat_map(|f| f.contacts.iter())
                .map(|c| format!("#{}({},{}) {:#x}", c.device_id, c.x, c.y, c.contact_flags.bits()))
                .collect();
            format!("PEN encode_time={} [{}]", event.encode_time, contacts.join(" "))
        }
        other => format!("event {:#06x}", other.event_id()),
    }
}
