//! Frame batching: turning registry state into one frame per cycle.
//!
//! [`drain`] walks every slot in index order.  Dirty slots are emitted as
//! stored.  Active slots that did not change are re-emitted too, so the peer
//! keeps seeing every live contact; a stale DOWN is rewritten to
//! UPDATE|INRANGE|INCONTACT first.  A slot whose emitted flags carry the
//! record's release flag is freed after emission.
//!
//! [`FrameTimeline`] tracks the timestamps used for `frameOffset` and
//! `encodeTime`.

use std::time::Duration;

use crate::domain::registry::{ContactRecord, ContactRegistry, Slot};
use crate::protocol::messages::{
    ContactFlags, PenContact, PenEventPdu, PenFrame, TouchContact, TouchEventPdu, TouchFrame,
};
use crate::protocol::varint::FOUR_BYTE_UNSIGNED_MAX;

/// Collects this cycle's contacts from `registry`.
///
/// An empty result means nothing should be sent.
pub fn drain<C: ContactRecord, const N: usize>(registry: &mut ContactRegistry<C, N>) -> Vec<C> {
    let mut contacts = Vec::new();
    for slot in registry.slots_mut().iter_mut() {
        if slot.dirty {
            slot.dirty = false;
        } else if slot.active {
            if slot.data.flags().contains(ContactFlags::DOWN) {
                slot.data.set_flags(ContactFlags::ONGOING);
            }
        } else {
            continue;
        }

        contacts.push(slot.data);
        if slot.data.flags().intersects(C::RELEASE_FLAG) {
            *slot = Slot::default();
        }
    }
    contacts
}

/// Send timestamps of one frame stream (touch or pen).
///
/// Timestamps are offsets from an arbitrary monotonic epoch chosen by the
/// caller.  `previous` only advances on [`FrameTimeline::commit`], so a failed
/// send does not shift the next frame's offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimeline {
    previous: Option<Duration>,
    current: Option<Duration>,
}

impl FrameTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `now` as the current frame time and returns the offset from
    /// the last committed frame in milliseconds, 0 for the first frame.
    pub fn stamp(&mut self, now: Duration) -> u64 {
        self.current = Some(now);
        match self.previous {
            Some(previous) => now.saturating_sub(previous).as_millis() as u64,
            None => 0,
        }
    }

    /// Makes the current frame time the reference for the next offset.
    pub fn commit(&mut self) {
        if self.current.is_some() {
            self.previous = self.current;
        }
    }

    pub fn previous(&self) -> Option<Duration> {
        self.previous
    }
}

/// `encodeTime` for a frame with the given offset, saturated to the wire range.
pub fn encode_time(offset_ms: u64) -> u32 {
    offset_ms.min(u64::from(FOUR_BYTE_UNSIGNED_MAX)) as u32
}

/// Wraps drained touch contacts into a single-frame TOUCH_EVENT.
///
/// `offset_ms` comes from [`FrameTimeline::stamp`]; the wire carries the
/// frame offset in microseconds.
pub fn touch_event(contacts: Vec<TouchContact>, offset_ms: u64) -> TouchEventPdu {
    TouchEventPdu {
        encode_time: encode_time(offset_ms),
        frames: vec![TouchFrame {
            frame_offset: offset_ms.saturating_mul(1000),
            contacts,
        }],
    }
}

/// Wraps drained pen contacts into a single-frame PEN_EVENT (milliseconds).
pub fn pen_event(contacts: Vec<PenContact>, offset_ms: u64) -> PenEventPdu {
    PenEventPdu {
        encode_time: encode_time(offset_ms),
        frames: vec![PenFrame {
            frame_offset: offset_ms,
            contacts,
        }],
    }
}
