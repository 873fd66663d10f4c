//! Version/feature negotiation and suspend/resume bookkeeping.
//!
//! [`ProtocolSession`] is a pure state machine: it consumes decoded inbound
//! PDUs and tells the caller what to do next via [`SessionAction`].  It never
//! performs I/O itself, which keeps it testable without a transport.
//!
//! ```text
//! Uninitialized ──open──► Negotiating ──SC_READY──► Ready ◄──RESUME── Suspended
//!                                                      └────SUSPEND──────►┘
//! any ──terminate──► Terminated
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::protocol::messages::{
    cs_ready_flags, sc_ready_features, CsReadyPdu, RdpeiPdu, ScReadyPdu, MAX_PEN_CONTACTS,
    MAX_TOUCH_CONTACTS, PROTOCOL_V100, PROTOCOL_V300,
};

/// Lifecycle state of one channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Constructed, channel not opened yet.
    Uninitialized,
    /// Channel open, waiting for the peer's SC_READY.
    Negotiating,
    /// Negotiation done; input may flow.
    Ready,
    /// The peer asked the host to stop sending input.
    Suspended,
    /// Closed or failed. Terminal.
    Terminated,
}

/// What the caller must do after feeding a PDU to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Encode and send this CS_READY reply.
    SendCsReady(CsReadyPdu),
    /// Invoke the host's suspend callback.
    SuspendInput,
    /// Invoke the host's resume callback.
    ResumeInput,
    /// Nothing to do.
    Ignore,
}

/// Negotiated session parameters and the channel state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSession {
    state: ChannelState,
    version: u32,
    features: u32,
    max_touch_contacts: u16,
    max_pen_contacts: u16,
}

impl Default for ProtocolSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolSession {
    /// Creates a session advertising the highest version we support.
    pub fn new() -> Self {
        Self {
            state: ChannelState::Uninitialized,
            version: PROTOCOL_V300,
            features: 0,
            max_touch_contacts: MAX_TOUCH_CONTACTS as u16,
            max_pen_contacts: MAX_PEN_CONTACTS as u16,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Negotiated protocol version (the local maximum until SC_READY arrives).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Feature bits the peer advertised, 0 if it sent none.
    pub fn features(&self) -> u32 {
        self.features
    }

    pub fn max_touch_contacts(&self) -> u16 {
        self.max_touch_contacts
    }

    pub fn max_pen_contacts(&self) -> u16 {
        self.max_pen_contacts
    }

    /// Marks the channel as open. Only valid from `Uninitialized`.
    pub fn open(&mut self) {
        if self.state == ChannelState::Uninitialized {
            self.state = ChannelState::Negotiating;
        }
    }

    /// Moves the session to its terminal state.
    pub fn terminate(&mut self) {
        self.state = ChannelState::Terminated;
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ChannelState::Terminated
    }

    /// Applies one inbound PDU and returns the follow-up action.
    ///
    /// `feature_mask` restricts which CS_READY flags may be advertised.
    /// PDUs arriving after termination are ignored.
    pub fn handle_pdu(&mut self, pdu: &RdpeiPdu, feature_mask: u32) -> SessionAction {
        if self.is_terminated() {
            debug!(event_id = pdu.event_id(), "PDU received after termination, ignoring");
            return SessionAction::Ignore;
        }

        match pdu {
            RdpeiPdu::ScReady(ready) => {
                SessionAction::SendCsReady(self.handle_sc_ready(ready, feature_mask))
            }
            RdpeiPdu::SuspendInput => {
                if self.state == ChannelState::Ready {
                    self.state = ChannelState::Suspended;
                }
                SessionAction::SuspendInput
            }
            RdpeiPdu::ResumeInput => {
                if self.state == ChannelState::Suspended {
                    self.state = ChannelState::Ready;
                }
                SessionAction::ResumeInput
            }
            RdpeiPdu::DismissHoveringContact => {
                debug!("dismiss hovering contact received, ignoring");
                SessionAction::Ignore
            }
            other => {
                debug!(event_id = other.event_id(), "unexpected event id, ignoring");
                SessionAction::Ignore
            }
        }
    }

    fn handle_sc_ready(&mut self, ready: &ScReadyPdu, feature_mask: u32) -> CsReadyPdu {
        if ready.protocol_version > PROTOCOL_V300 {
            warn!(
                peer_version = ready.protocol_version,
                local_version = self.version,
                "peer advertises an unknown protocol version, continuing with ours"
            );
        }
        if ready.protocol_version < self.version {
            self.version = ready.protocol_version;
        }
        self.features = ready.features.unwrap_or(0);
        self.state = ChannelState::Ready;

        let reply = CsReadyPdu {
            flags: self.cs_ready_flags(feature_mask),
            protocol_version: self.version,
            max_touch_contacts: self.max_touch_contacts,
        };
        debug!(
            version = self.version,
            features = self.features,
            flags = reply.flags,
            "negotiation complete"
        );
        reply
    }

    fn cs_ready_flags(&self, feature_mask: u32) -> u32 {
        let mut flags = cs_ready_flags::SHOW_TOUCH_VISUALS & feature_mask;
        if self.version > PROTOCOL_V100 {
            flags |= cs_ready_flags::DISABLE_TIMESTAMP_INJECTION & feature_mask;
        }
        if self.features & sc_ready_features::MULTIPEN_INJECTION_SUPPORTED != 0 {
            flags |= cs_ready_flags::ENABLE_MULTIPEN_INJECTION & feature_mask;
        }
        flags
    }
}
