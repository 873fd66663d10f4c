//! # rdpei-core
//!
//! Shared library for the touch/pen input channel: the wire codec, the
//! contact data model, the fixed-capacity contact registries, the frame
//! batcher and the negotiation state machine.
//!
//! It has zero dependencies on OS APIs, async runtimes, or transports.
//!
//! # Architecture overview (for beginners)
//!
//! A remote-display client forwards finger and stylus input to the remote
//! machine over a dedicated channel.  Input arrives one event at a time
//! ("finger 3 moved to (120, 40)"), but the channel sends it in batches: every
//! 20 ms one frame carrying the current state of every live contact.
//!
//! - **`protocol`** – How bytes travel over the channel.  PDUs are encoded
//!   into a compact little-endian header plus a body made of variable-length
//!   integers, and decoded back into typed Rust structs.  The negotiation
//!   state machine also lives here.
//!
//! - **`domain`** – Pure contact bookkeeping.  Registries map host-side
//!   contact ids to small wire ids, and the batcher turns registry state into
//!   one frame per cycle.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rdpei_core::TouchRegistry` instead of `rdpei_core::domain::registry::TouchRegistry`.
pub use domain::batcher::{drain, FrameTimeline};
pub use domain::contact::{PenOptionalFields, TouchOptionalFields};
pub use domain::registry::{ExternalId, PenRegistry, TouchRegistry};
pub use protocol::codec::{decode_pdu, encode_pdu, ProtocolError};
pub use protocol::messages::{ContactFlags, PenFlags, RdpeiPdu};
pub use protocol::negotiation::{ChannelState, ProtocolSession, SessionAction};
