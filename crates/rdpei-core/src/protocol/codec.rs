//! Binary codec for encoding and decoding input channel PDUs.
//!
//! Wire format:
//! ```text
//! [event_id:2][pdu_length:4][body:pdu_length-6]
//! ```
//! Header integers are little-endian and `pdu_length` counts the header.
//! Touch and pen bodies are built from the variable-length integer families
//! in [`crate::protocol::varint`].

use thiserror::Error;

use crate::protocol::messages::{
    ContactFlags, ContactRect, CsReadyPdu, EventId, PenContact, PenEventPdu, PenFieldsPresent,
    PenFlags, PenFrame, RdpeiPdu, ScReadyPdu, TouchContact, TouchEventPdu, TouchFieldsPresent,
    TouchFrame, HEADER_SIZE, PROTOCOL_V300,
};
use crate::protocol::varint::{
    write_eight_byte_unsigned, write_four_byte_signed, write_four_byte_unsigned,
    write_two_byte_signed, write_two_byte_unsigned, WireReader,
};

/// Errors that can occur during PDU encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the length the PDU requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The `pdu_length` header field is smaller than the header itself.
    #[error("invalid PDU length {declared}: must be at least 6")]
    InvalidPduLength { declared: u32 },

    /// A value does not fit the integer family it is written with.
    #[error("value {value} is out of range for {family}")]
    ValueOutOfRange { family: &'static str, value: i128 },

    /// The body could not be encoded or parsed for another reason.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`RdpeiPdu`] into a byte vector including the 6-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError`] if a field does not fit its wire encoding or a
/// count exceeds what the format can carry.
///
/// # Examples
///
/// ```rust
/// use rdpei_core::protocol::{decode_pdu, encode_pdu};
/// use rdpei_core::protocol::messages::{CsReadyPdu, RdpeiPdu, PROTOCOL_V300};
///
/// let pdu = RdpeiPdu::CsReady(CsReadyPdu {
///     flags: 0x1,
///     protocol_version: PROTOCOL_V300,
///     max_touch_contacts: 64,
/// });
/// let bytes = encode_pdu(&pdu).unwrap();
/// assert_eq!(bytes.len(), 16);
/// let (decoded, consumed) = decode_pdu(&bytes).unwrap();
/// assert_eq!(decoded, pdu);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_pdu(pdu: &RdpeiPdu) -> Result<Vec<u8>, ProtocolError> {
    let mut body = Vec::new();
    match pdu {
        RdpeiPdu::ScReady(m) => encode_sc_ready(&mut body, m),
        RdpeiPdu::CsReady(m) => encode_cs_ready(&mut body, m),
        RdpeiPdu::Touch(m) => encode_touch_event(&mut body, m)?,
        RdpeiPdu::Pen(m) => encode_pen_event(&mut body, m)?,
        RdpeiPdu::SuspendInput
        | RdpeiPdu::ResumeInput
        | RdpeiPdu::DismissHoveringContact
        | RdpeiPdu::Unrecognized { .. } => {}
    }

    let pdu_length = u32::try_from(HEADER_SIZE + body.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!("body of {} bytes is too large", body.len()))
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&pdu.event_id().to_le_bytes());
    buf.extend_from_slice(&pdu_length.to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Decodes one [`RdpeiPdu`] from the beginning of `bytes`.
///
/// Returns the decoded PDU and the number of bytes consumed, which is always
/// the header's `pdu_length`.  Bytes after the last field a body defines are
/// skipped.  An unknown event id decodes to [`RdpeiPdu::Unrecognized`].
///
/// # Errors
///
/// Returns [`ProtocolError`] if the header is short or inconsistent, or the
/// body ends before a required field.
pub fn decode_pdu(bytes: &[u8]) -> Result<(RdpeiPdu, usize), ProtocolError> {
    let mut header = WireReader::new(bytes);
    let event_id = header.read_u16_le()?;
    let declared = header.read_u32_le()?;

    let pdu_length = declared as usize;
    if pdu_length < HEADER_SIZE {
        return Err(ProtocolError::InvalidPduLength { declared });
    }
    if bytes.len() < pdu_length {
        return Err(ProtocolError::InsufficientData {
            needed: pdu_length,
            available: bytes.len(),
        });
    }

    let mut body = WireReader::new(&bytes[HEADER_SIZE..pdu_length]);
    let pdu = match EventId::try_from(event_id) {
        Ok(EventId::ScReady) => RdpeiPdu::ScReady(decode_sc_ready(&mut body)?),
        Ok(EventId::CsReady) => RdpeiPdu::CsReady(decode_cs_ready(&mut body)?),
        Ok(EventId::Touch) => RdpeiPdu::Touch(decode_touch_event(&mut body)?),
        Ok(EventId::Pen) => RdpeiPdu::Pen(decode_pen_event(&mut body)?),
        Ok(EventId::SuspendInput) => RdpeiPdu::SuspendInput,
        Ok(EventId::ResumeInput) => RdpeiPdu::ResumeInput,
        Ok(EventId::DismissHoveringContact) => RdpeiPdu::DismissHoveringContact,
        Err(()) => RdpeiPdu::Unrecognized { event_id },
    };
    Ok((pdu, pdu_length))
}

// ── Ready PDUs ────────────────────────────────────────────────────────────────

fn encode_sc_ready(buf: &mut Vec<u8>, m: &ScReadyPdu) {
    buf.extend_from_slice(&m.protocol_version.to_le_bytes());
    if let Some(features) = m.features {
        buf.extend_from_slice(&features.to_le_bytes());
    }
}

fn decode_sc_ready(r: &mut WireReader<'_>) -> Result<ScReadyPdu, ProtocolError> {
    let protocol_version = r.read_u32_le()?;
    // Mandatory from 3.0.0 on; older peers may still append it.
    let features = if protocol_version >= PROTOCOL_V300 || r.remaining() >= 4 {
        Some(r.read_u32_le()?)
    } else {
        None
    };
    Ok(ScReadyPdu {
        protocol_version,
        features,
    })
}

fn encode_cs_ready(buf: &mut Vec<u8>, m: &CsReadyPdu) {
    buf.extend_from_slice(&m.flags.to_le_bytes());
    buf.extend_from_slice(&m.protocol_version.to_le_bytes());
    buf.extend_from_slice(&m.max_touch_contacts.to_le_bytes());
}

fn decode_cs_ready(r: &mut WireReader<'_>) -> Result<CsReadyPdu, ProtocolError> {
    Ok(CsReadyPdu {
        flags: r.read_u32_le()?,
        protocol_version: r.read_u32_le()?,
        max_touch_contacts: r.read_u16_le()?,
    })
}

// ── Touch PDU ─────────────────────────────────────────────────────────────────

fn encode_touch_event(buf: &mut Vec<u8>, m: &TouchEventPdu) -> Result<(), ProtocolError> {
    write_four_byte_unsigned(buf, m.encode_time)?;
    write_two_byte_unsigned(buf, count_u16(m.frames.len(), "frameCount")?)?;
    for frame in &m.frames {
        write_two_byte_unsigned(buf, count_u16(frame.contacts.len(), "contactCount")?)?;
        write_eight_byte_unsigned(buf, frame.frame_offset)?;
        for contact in &frame.contacts {
            encode_touch_contact(buf, contact)?;
        }
    }
    Ok(())
}

fn encode_touch_contact(buf: &mut Vec<u8>, c: &TouchContact) -> Result<(), ProtocolError> {
    buf.push(c.contact_id);
    write_two_byte_unsigned(buf, c.fields_present().bits())?;
    write_four_byte_signed(buf, c.x)?;
    write_four_byte_signed(buf, c.y)?;
    write_four_byte_unsigned(buf, c.contact_flags.bits())?;
    if let Some(rect) = c.rect {
        write_two_byte_signed(buf, rect.left)?;
        write_two_byte_signed(buf, rect.top)?;
        write_two_byte_signed(buf, rect.right)?;
        write_two_byte_signed(buf, rect.bottom)?;
    }
    if let Some(orientation) = c.orientation {
        write_four_byte_unsigned(buf, orientation)?;
    }
    if let Some(pressure) = c.pressure {
        write_four_byte_unsigned(buf, pressure)?;
    }
    Ok(())
}

fn decode_touch_event(r: &mut WireReader<'_>) -> Result<TouchEventPdu, ProtocolError> {
    let encode_time = r.read_four_byte_unsigned()?;
    let frame_count = r.read_two_byte_unsigned()?;
    let mut frames = Vec::with_capacity(usize::from(frame_count).min(64));
    for _ in 0..frame_count {
        let contact_count = r.read_two_byte_unsigned()?;
        let frame_offset = r.read_eight_byte_unsigned()?;
        let mut contacts = Vec::with_capacity(usize::from(contact_count).min(64));
        for _ in 0..contact_count {
            contacts.push(decode_touch_contact(r)?);
        }
        frames.push(TouchFrame {
            frame_offset,
            contacts,
        });
    }
    Ok(TouchEventPdu {
        encode_time,
        frames,
    })
}

fn decode_touch_contact(r: &mut WireReader<'_>) -> Result<TouchContact, ProtocolError> {
    let contact_id = r.read_u8()?;
    let fields = TouchFieldsPresent(r.read_two_byte_unsigned()?);
    let x = r.read_four_byte_signed()?;
    let y = r.read_four_byte_signed()?;
    let contact_flags = ContactFlags(r.read_four_byte_unsigned()?);

    let rect = if fields.contains(TouchFieldsPresent::CONTACT_RECT) {
        Some(ContactRect {
            left: r.read_two_byte_signed()?,
            top: r.read_two_byte_signed()?,
            right: r.read_two_byte_signed()?,
            bottom: r.read_two_byte_signed()?,
        })
    } else {
        None
    };
    let orientation = if fields.contains(TouchFieldsPresent::ORIENTATION) {
        Some(r.read_four_byte_unsigned()?)
    } else {
        None
    };
    let pressure = if fields.contains(TouchFieldsPresent::PRESSURE) {
        Some(r.read_four_byte_unsigned()?)
    } else {
        None
    };

    Ok(TouchContact {
        contact_id,
        x,
        y,
        contact_flags,
        rect,
        orientation,
        pressure,
    })
}

// ── Pen PDU ───────────────────────────────────────────────────────────────────

fn encode_pen_event(buf: &mut Vec<u8>, m: &PenEventPdu) -> Result<(), ProtocolError> {
    write_four_byte_unsigned(buf, m.encode_time)?;
    write_two_byte_unsigned(buf, count_u16(m.frames.len(), "frameCount")?)?;
    for frame in &m.frames {
        write_two_byte_unsigned(buf, count_u16(frame.contacts.len(), "contactCount")?)?;
        write_eight_byte_unsigned(buf, frame.frame_offset)?;
        for contact in &frame.contacts {
            encode_pen_contact(buf, contact)?;
        }
    }
    Ok(())
}

fn encode_pen_contact(buf: &mut Vec<u8>, c: &PenContact) -> Result<(), ProtocolError> {
    buf.push(c.device_id);
    write_two_byte_unsigned(buf, c.fields_present().bits())?;
    write_four_byte_signed(buf, c.x)?;
    write_four_byte_signed(buf, c.y)?;
    write_four_byte_unsigned(buf, c.contact_flags.bits())?;
    if let Some(pen_flags) = c.pen_flags {
        write_four_byte_unsigned(buf, pen_flags.bits())?;
    }
    if let Some(pressure) = c.pressure {
        write_four_byte_unsigned(buf, pressure)?;
    }
    if let Some(rotation) = c.rotation {
        write_two_byte_unsigned(buf, rotation)?;
    }
    if let Some(tilt_x) = c.tilt_x {
        write_two_byte_signed(buf, tilt_x)?;
    }
    if let Some(tilt_y) = c.tilt_y {
        write_two_byte_signed(buf, tilt_y)?;
    }
    Ok(())
}

fn decode_pen_event(r: &mut WireReader<'_>) -> Result<PenEventPdu, ProtocolError> {
    let encode_time = r.read_four_byte_unsigned()?;
    let frame_count = r.read_two_byte_unsigned()?;
    let mut frames = Vec::with_capacity(usize::from(frame_count).min(64));
    for _ in 0..frame_count {
        let contact_count = r.read_two_byte_unsigned()?;
        let frame_offset = r.read_eight_byte_unsigned()?;
        let mut contacts = Vec::with_capacity(usize::from(contact_count).min(8));
        for _ in 0..contact_count {
            contacts.push(decode_pen_contact(r)?);
        }
        frames.push(PenFrame {
            frame_offset,
            contacts,
        });
    }
    Ok(PenEventPdu {
        encode_time,
        frames,
    })
}

fn decode_pen_contact(r: &mut WireReader<'_>) -> Result<PenContact, ProtocolError> {
    let device_id = r.read_u8()?;
    let fields = PenFieldsPresent(r.read_two_byte_unsigned()?);
    let x = r.read_four_byte_signed()?;
    let y = r.read_four_byte_signed()?;
    let contact_flags = ContactFlags(r.read_four_byte_unsigned()?);

    let mut contact = PenContact {
        device_id,
        x,
        y,
        contact_flags,
        ..PenContact::default()
    };
    if fields.contains(PenFieldsPresent::PEN_FLAGS) {
        contact.pen_flags = Some(PenFlags(r.read_four_byte_unsigned()?));
    }
    if fields.contains(PenFieldsPresent::PRESSURE) {
        contact.pressure = Some(r.read_four_byte_unsigned()?);
    }
    if fields.contains(PenFieldsPresent::ROTATION) {
        contact.rotation = Some(r.read_two_byte_unsigned()?);
    }
    if fields.contains(PenFieldsPresent::TILT_X) {
        contact.tilt_x = Some(r.read_two_byte_signed()?);
    }
    if fields.contains(PenFieldsPresent::TILT_Y) {
        contact.tilt_y = Some(r.read_two_byte_signed()?);
    }
    Ok(contact)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn count_u16(len: usize, field: &str) -> Result<u16, ProtocolError> {
    u16::try_from(len)
        .ok()
        .filter(|n| *n <= crate::protocol::varint::TWO_BYTE_UNSIGNED_MAX)
        .ok_or_else(|| ProtocolError::MalformedPayload(format!("{field} {len} is too large")))
}
