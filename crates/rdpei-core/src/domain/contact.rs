//! Building wire contacts from host input events.
//!
//! Host calls carry a position, a set of transition flags and a handful of
//! optional values.  This module turns them into [`TouchContact`] /
//! [`PenContact`] records whose every field is representable on the wire:
//!
//! - orientation and pen rotation are clamped to 0–359 degrees,
//! - pressure is clamped to 0–1024,
//! - tilt and the derived touch rectangle are clamped to the two-byte signed
//!   range,
//! - coordinates are clamped to the four-byte signed range.
//!
//! Every clamp is logged at warn level.  The contact id is left at 0; the
//! registry assigns it when the record is stored.

use tracing::warn;

use crate::protocol::messages::{ContactFlags, ContactRect, PenContact, PenFlags, TouchContact};
use crate::protocol::varint::{FOUR_BYTE_SIGNED_MAX, TWO_BYTE_SIGNED_MAX};

/// Half the side length of the rectangle derived around a touch point.
pub const RECT_HALF_EXTENT: i32 = 2;
/// Largest orientation or rotation in degrees.
pub const MAX_ORIENTATION: u32 = 359;
/// Largest normalised pressure.
pub const MAX_PRESSURE: u32 = 1024;

// ── Optional field builders ───────────────────────────────────────────────────

/// Optional values of a touch event.  Unset fields are omitted on the wire.
///
/// ```rust
/// use rdpei_core::domain::contact::TouchOptionalFields;
///
/// let fields = TouchOptionalFields::new().orientation(90).pressure(512);
/// assert_eq!(fields.orientation, Some(90));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchOptionalFields {
    pub orientation: Option<u32>,
    pub pressure: Option<u32>,
}

impl TouchOptionalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orientation(mut self, degrees: u32) -> Self {
        self.orientation = Some(degrees);
        self
    }

    pub fn pressure(mut self, pressure: u32) -> Self {
        self.pressure = Some(pressure);
        self
    }
}

/// Optional values of a pen event.  Unset fields are omitted on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenOptionalFields {
    pub pen_flags: Option<PenFlags>,
    pub pressure: Option<u32>,
    pub rotation: Option<u32>,
    pub tilt_x: Option<i32>,
    pub tilt_y: Option<i32>,
}

impl PenOptionalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pen_flags(mut self, flags: PenFlags) -> Self {
        self.pen_flags = Some(flags);
        self
    }

    pub fn pressure(mut self, pressure: u32) -> Self {
        self.pressure = Some(pressure);
        self
    }

    pub fn rotation(mut self, degrees: u32) -> Self {
        self.rotation = Some(degrees);
        self
    }

    pub fn tilt(mut self, tilt_x: i32, tilt_y: i32) -> Self {
        self.tilt_x = Some(tilt_x);
        self.tilt_y = Some(tilt_y);
        self
    }
}

// ── Contact construction ──────────────────────────────────────────────────────

impl TouchContact {
    /// Builds a normalised touch contact.  The rectangle is always derived
    /// from the position, never taken from the caller.
    pub fn from_event(x: i32, y: i32, flags: ContactFlags, fields: TouchOptionalFields) -> Self {
        let x = clamp_coordinate(x, "x");
        let y = clamp_coordinate(y, "y");
        Self {
            contact_id: 0,
            x,
            y,
            contact_flags: flags,
            rect: Some(derive_rect(x, y)),
            orientation: fields.orientation.map(|o| clamp_orientation(o, "orientation")),
            pressure: fields.pressure.map(clamp_pressure),
        }
    }
}

impl PenContact {
    /// Builds a normalised pen contact.
    pub fn from_event(x: i32, y: i32, flags: ContactFlags, fields: PenOptionalFields) -> Self {
        Self {
            device_id: 0,
            x: clamp_coordinate(x, "x"),
            y: clamp_coordinate(y, "y"),
            contact_flags: flags,
            pen_flags: fields.pen_flags,
            pressure: fields.pressure.map(clamp_pressure),
            // Clamped to 359, always fits.
            rotation: fields.rotation.map(|r| clamp_orientation(r, "rotation") as u16),
            tilt_x: fields.tilt_x.map(|t| clamp_two_byte_signed(i64::from(t), "tilt_x")),
            tilt_y: fields.tilt_y.map(|t| clamp_two_byte_signed(i64::from(t), "tilt_y")),
        }
    }
}

// ── Normalisation ─────────────────────────────────────────────────────────────

fn clamp_orientation(value: u32, field: &'static str) -> u32 {
    if value > MAX_ORIENTATION {
        warn!(field, value, "clamping to {}", MAX_ORIENTATION);
        MAX_ORIENTATION
    } else {
        value
    }
}

fn clamp_pressure(value: u32) -> u32 {
    if value > MAX_PRESSURE {
        warn!(field = "pressure", value, "clamping to {}", MAX_PRESSURE);
        MAX_PRESSURE
    } else {
        value
    }
}

fn clamp_coordinate(value: i32, field: &'static str) -> i32 {
    let clamped = value.clamp(-FOUR_BYTE_SIGNED_MAX, FOUR_BYTE_SIGNED_MAX);
    if clamped != value {
        warn!(field, value, clamped, "coordinate outside wire range");
    }
    clamped
}

fn clamp_two_byte_signed(value: i64, field: &'static str) -> i16 {
    let max = i64::from(TWO_BYTE_SIGNED_MAX);
    let clamped = value.clamp(-max, max);
    if clamped != value {
        warn!(field, value, clamped, "value outside wire range");
    }
    // Within ±0x3FFF after the clamp.
    clamped as i16
}

/// Rectangle of ±[`RECT_HALF_EXTENT`] around the contact point.
pub fn derive_rect(x: i32, y: i32) -> ContactRect {
    let (x, y) = (i64::from(x), i64::from(y));
    let half = i64::from(RECT_HALF_EXTENT);
    ContactRect {
        left: clamp_two_byte_signed(x - half, "rect.left"),
        top: clamp_two_byte_signed(y - half, "rect.top"),
        right: clamp_two_byte_signed(x + half, "rect.right"),
        bottom: clamp_two_byte_signed(y + half, "rect.bottom"),
    }
}
