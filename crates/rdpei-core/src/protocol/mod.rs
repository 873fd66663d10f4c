//! Protocol module containing PDU types, the binary codec and negotiation.

pub mod codec;
pub mod messages;
pub mod negotiation;
pub mod varint;

pub use codec::{decode_pdu, encode_pdu, ProtocolError};
pub use messages::*;
pub use negotiation::{ChannelState, ProtocolSession, SessionAction};
