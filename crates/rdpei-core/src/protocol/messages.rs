//! Input channel PDU types.
//!
//! Layouts follow the [MS-RDPEI] wire format.  Every PDU starts with a
//! 6-byte header (`eventId` + `pduLength`, little-endian); the payload mixes
//! fixed-width little-endian fields (ready PDUs) with the variable-length
//! integer families in [`crate::protocol::varint`] (touch and pen PDUs).

use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the common PDU header in bytes.
pub const HEADER_SIZE: usize = 6;

/// Protocol version 1.0.0, the oldest supported version.
pub const PROTOCOL_V100: u32 = 0x0001_0000;
/// Protocol version 1.0.1.
pub const PROTOCOL_V101: u32 = 0x0001_0001;
/// Protocol version 2.0.0 (adds timestamp-injection control).
pub const PROTOCOL_V200: u32 = 0x0002_0000;
/// Protocol version 3.0.0 (adds pen input), the highest version we know.
pub const PROTOCOL_V300: u32 = 0x0003_0000;

/// Number of simultaneous touch contacts the client tracks.
pub const MAX_TOUCH_CONTACTS: usize = 64;
/// Number of simultaneous pen contacts the client tracks.
pub const MAX_PEN_CONTACTS: usize = 4;

/// Feature bits the peer may advertise in SC_READY.
pub mod sc_ready_features {
    pub const MULTIPEN_INJECTION_SUPPORTED: u32 = 0x0000_0001;
}

/// Flag bits the client may advertise in CS_READY.
pub mod cs_ready_flags {
    pub const SHOW_TOUCH_VISUALS: u32 = 0x0000_0001;
    pub const DISABLE_TIMESTAMP_INJECTION: u32 = 0x0000_0002;
    pub const ENABLE_MULTIPEN_INJECTION: u32 = 0x0000_0004;
}

// ── Event identifiers ─────────────────────────────────────────────────────────

/// PDU event identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventId {
    ScReady = 0x0001,
    CsReady = 0x0002,
    Touch = 0x0003,
    SuspendInput = 0x0004,
    ResumeInput = 0x0005,
    DismissHoveringContact = 0x0006,
    Pen = 0x0008,
}

impl TryFrom<u16> for EventId {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            0x0001 => Ok(EventId::ScReady),
            0x0002 => Ok(EventId::CsReady),
            0x0003 => Ok(EventId::Touch),
            0x0004 => Ok(EventId::SuspendInput),
            0x0005 => Ok(EventId::ResumeInput),
            0x0006 => Ok(EventId::DismissHoveringContact),
            0x0008 => Ok(EventId::Pen),
            _ => Err(()),
        }
    }
}

// ── Bit sets ──────────────────────────────────────────────────────────────────

macro_rules! bit_set {
    ($(#[$meta:meta])* $name:ident($repr:ty) { $($(#[$cmeta:meta])* $flag:ident = $value:expr;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub $repr);

        impl $name {
            $($(#[$cmeta])* pub const $flag: $name = $name($value);)*

            /// Returns `true` if every bit of `other` is set in `self`.
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns `true` if any bit of `other` is set in `self`.
            pub const fn intersects(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn bits(self) -> $repr {
                self.0
            }
        }

        impl BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = $name;
            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }
    };
}

bit_set! {
    /// Contact state transition flags shared by touch and pen contacts.
    ContactFlags(u32) {
        DOWN = 0x0001;
        UPDATE = 0x0002;
        UP = 0x0004;
        INRANGE = 0x0008;
        INCONTACT = 0x0010;
        CANCELED = 0x0020;
    }
}

bit_set! {
    /// Optional-field presence bits of a touch contact.
    TouchFieldsPresent(u16) {
        CONTACT_RECT = 0x0001;
        ORIENTATION = 0x0002;
        PRESSURE = 0x0004;
    }
}

bit_set! {
    /// Optional-field presence bits of a pen contact.
    PenFieldsPresent(u16) {
        PEN_FLAGS = 0x0001;
        PRESSURE = 0x0002;
        ROTATION = 0x0004;
        TILT_X = 0x0008;
        TILT_Y = 0x0010;
    }
}

bit_set! {
    /// Pen button state carried in the optional `penFlags` field.
    PenFlags(u32) {
        BARREL_PRESSED = 0x0001;
        ERASER_PRESSED = 0x0002;
        INVERTED = 0x0004;
    }
}

impl ContactFlags {
    /// Flags every still-active contact presents after its first emission.
    pub const ONGOING: ContactFlags =
        ContactFlags(Self::UPDATE.0 | Self::INRANGE.0 | Self::INCONTACT.0);
}

// ── Contacts ──────────────────────────────────────────────────────────────────

/// Bounding box of a touch contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

/// One touch contact inside a touch frame.
///
/// Optional fields are present on the wire exactly when they are `Some`;
/// [`TouchContact::fields_present`] derives the presence bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchContact {
    /// Slot index of the contact in the client's registry.
    pub contact_id: u8,
    pub x: i32,
    pub y: i32,
    pub contact_flags: ContactFlags,
    pub rect: Option<ContactRect>,
    /// Degrees, 0–359.
    pub orientation: Option<u32>,
    /// Normalised pressure, 0–1024.
    pub pressure: Option<u32>,
}

impl TouchContact {
    pub fn fields_present(&self) -> TouchFieldsPresent {
        let mut fields = TouchFieldsPresent::default();
        if self.rect.is_some() {
            fields |= TouchFieldsPresent::CONTACT_RECT;
        }
        if self.orientation.is_some() {
            fields |= TouchFieldsPresent::ORIENTATION;
        }
        if self.pressure.is_some() {
            fields |= TouchFieldsPresent::PRESSURE;
        }
        fields
    }
}

/// One pen contact inside a pen frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenContact {
    /// Slot index of the pen in the client's registry.
    pub device_id: u8,
    pub x: i32,
    pub y: i32,
    pub contact_flags: ContactFlags,
    pub pen_flags: Option<PenFlags>,
    /// Normalised pressure, 0–1024.
    pub pressure: Option<u32>,
    /// Degrees, 0–359.
    pub rotation: Option<u16>,
    pub tilt_x: Option<i16>,
    pub tilt_y: Option<i16>,
}

impl PenContact {
    pub fn fields_present(&self) -> PenFieldsPresent {
        let mut fields = PenFieldsPresent::default();
        if self.pen_flags.is_some() {
            fields |= PenFieldsPresent::PEN_FLAGS;
        }
        if self.pressure.is_some() {
            fields |= PenFieldsPresent::PRESSURE;
        }
        if self.rotation.is_some() {
            fields |= PenFieldsPresent::ROTATION;
        }
        if self.tilt_x.is_some() {
            fields |= PenFieldsPresent::TILT_X;
        }
        if self.tilt_y.is_some() {
            fields |= PenFieldsPresent::TILT_Y;
        }
        fields
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// A batch of touch contacts sharing one timestamp offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchFrame {
    /// Offset from the previous frame in **microseconds**, 0 for the first frame.
    pub frame_offset: u64,
    pub contacts: Vec<TouchContact>,
}

/// A batch of pen contacts sharing one timestamp offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenFrame {
    /// Offset from the previous frame in **milliseconds**, 0 for the first frame.
    pub frame_offset: u64,
    pub contacts: Vec<PenContact>,
}

// ── PDU payloads ──────────────────────────────────────────────────────────────

/// SC_READY (0x0001): the peer announces its protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScReadyPdu {
    pub protocol_version: u32,
    /// Absent on the wire for peers older than 3.0.0.
    pub features: Option<u32>,
}

/// CS_READY (0x0002): the client's reply to SC_READY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsReadyPdu {
    /// Bitmask of [`cs_ready_flags`].
    pub flags: u32,
    pub protocol_version: u32,
    pub max_touch_contacts: u16,
}

/// TOUCH_EVENT (0x0003).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEventPdu {
    /// Milliseconds between generation of the oldest frame and its encoding.
    pub encode_time: u32,
    pub frames: Vec<TouchFrame>,
}

/// PEN_EVENT (0x0008).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenEventPdu {
    /// Milliseconds between generation of the oldest frame and its encoding.
    pub encode_time: u32,
    pub frames: Vec<PenFrame>,
}

/// Every PDU that travels over the input channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RdpeiPdu {
    ScReady(ScReadyPdu),
    CsReady(CsReadyPdu),
    Touch(TouchEventPdu),
    SuspendInput,
    ResumeInput,
    DismissHoveringContact,
    Pen(PenEventPdu),
    /// A well-framed PDU whose event id we do not know; its body is skipped.
    Unrecognized { event_id: u16 },
}

impl RdpeiPdu {
    /// Returns the event id written into the header for this PDU.
    pub fn event_id(&self) -> u16 {
        match self {
            RdpeiPdu::ScReady(_) => EventId::ScReady as u16,
            RdpeiPdu::CsReady(_) => EventId::CsReady as u16,
            RdpeiPdu::Touch(_) => EventId::Touch as u16,
            RdpeiPdu::SuspendInput => EventId::SuspendInput as u16,
            RdpeiPdu::ResumeInput => EventId::ResumeInput as u16,
            RdpeiPdu::DismissHoveringContact => EventId::DismissHoveringContact as u16,
            RdpeiPdu::Pen(_) => EventId::Pen as u16,
            RdpeiPdu::Unrecognized { event_id } => *event_id,
        }
    }
}
