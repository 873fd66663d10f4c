//! Fixed-capacity contact registries.
//!
//! A registry is an arena of `N` slots indexed by slot id.  Allocation is a
//! linear scan for the first inactive slot; freeing resets the slot in place.
//! Capacity never grows: when every slot is active, a new contact is dropped.
//!
//! # Invariants
//!
//! - At most one active slot per external id.
//! - A slot id stays bound to its external id until the batcher emits the
//!   record's release flag (UP for touch, CANCELED for pen).
//! - `dirty` is set by [`ContactRegistry::upsert`] and cleared only by
//!   [`crate::domain::batcher::drain`].

use tracing::{debug, warn};

use crate::protocol::messages::{
    ContactFlags, PenContact, TouchContact, MAX_PEN_CONTACTS, MAX_TOUCH_CONTACTS,
};

/// Opaque identifier the host uses for one finger or one pen.
pub type ExternalId = u32;

/// Per-kind behaviour the registry and batcher need from a contact record.
pub trait ContactRecord: Copy + Default {
    /// Human-readable kind used in log messages.
    const KIND: &'static str;

    /// Emitting a record carrying this flag frees its slot.
    const RELEASE_FLAG: ContactFlags;

    fn flags(&self) -> ContactFlags;

    fn set_flags(&mut self, flags: ContactFlags);

    /// Stores the slot id in the record's wire id field.
    fn set_slot_id(&mut self, slot_id: u8);

    /// Whether an event with `flags` may bind a new slot.
    fn starts_contact(flags: ContactFlags) -> bool;
}

impl ContactRecord for TouchContact {
    const KIND: &'static str = "touch";
    const RELEASE_FLAG: ContactFlags = ContactFlags::UP;

    fn flags(&self) -> ContactFlags {
        self.contact_flags
    }

    fn set_flags(&mut self, flags: ContactFlags) {
        self.contact_flags = flags;
    }

    fn set_slot_id(&mut self, slot_id: u8) {
        self.contact_id = slot_id;
    }

    fn starts_contact(flags: ContactFlags) -> bool {
        flags.contains(ContactFlags::DOWN)
    }
}

impl ContactRecord for PenContact {
    const KIND: &'static str = "pen";
    const RELEASE_FLAG: ContactFlags = ContactFlags::CANCELED;

    fn flags(&self) -> ContactFlags {
        self.contact_flags
    }

    fn set_flags(&mut self, flags: ContactFlags) {
        self.contact_flags = flags;
    }

    fn set_slot_id(&mut self, slot_id: u8) {
        self.device_id = slot_id;
    }

    // A hovering pen is tracked from the moment it comes into range.
    fn starts_contact(flags: ContactFlags) -> bool {
        flags.contains(ContactFlags::INRANGE)
    }
}

/// One entry of a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot<C> {
    pub external_id: ExternalId,
    pub active: bool,
    pub dirty: bool,
    pub data: C,
}

/// Arena of `N` contact slots.
#[derive(Debug, Clone)]
pub struct ContactRegistry<C: ContactRecord, const N: usize> {
    slots: [Slot<C>; N],
}

/// Registry of touch contacts.
pub type TouchRegistry = ContactRegistry<TouchContact, MAX_TOUCH_CONTACTS>;
/// Registry of pen contacts.
pub type PenRegistry = ContactRegistry<PenContact, MAX_PEN_CONTACTS>;

impl<C: ContactRecord, const N: usize> Default for ContactRegistry<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ContactRecord, const N: usize> ContactRegistry<C, N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns the slot index for `external_id`.
    ///
    /// With `want_active` only an active slot bound to the id is returned.
    /// Without it an active slot for the id is still preferred; otherwise the
    /// first inactive slot is bound to the id and activated.  `None` means no
    /// match, or a full registry.
    pub fn find_or_allocate(&mut self, external_id: ExternalId, want_active: bool) -> Option<usize> {
        if let Some(index) = self
            .slots
            .iter()
            .position(|s| s.active && s.external_id == external_id)
        {
            return Some(index);
        }
        if want_active {
            return None;
        }

        let index = self.slots.iter().position(|s| !s.active)?;
        let slot = &mut self.slots[index];
        *slot = Slot {
            external_id,
            active: true,
            dirty: false,
            data: C::default(),
        };
        Some(index)
    }

    /// Stores `record` for `external_id` and marks the slot dirty.
    ///
    /// A record whose flags start a contact may allocate a slot; any other
    /// record only updates an existing one.  Returns the slot id, or `None`
    /// if the event was dropped.
    pub fn upsert(&mut self, external_id: ExternalId, mut record: C) -> Option<u8> {
        let allocate = C::starts_contact(record.flags());
        let Some(index) = self.find_or_allocate(external_id, !allocate) else {
            if allocate {
                warn!(
                    kind = C::KIND,
                    external_id,
                    capacity = N,
                    "contact registry full, dropping event"
                );
            } else {
                debug!(kind = C::KIND, external_id, "no active contact, dropping event");
            }
            return None;
        };

        // N is at most 64, so every index fits the one-byte wire id.
        let slot_id = index as u8;
        record.set_slot_id(slot_id);
        let slot = &mut self.slots[index];
        slot.data = record;
        slot.dirty = true;
        Some(slot_id)
    }

    pub fn slot(&self, slot_id: usize) -> Option<&Slot<C>> {
        self.slots.get(slot_id)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    pub fn has_dirty(&self) -> bool {
        self.slots.iter().any(|s| s.dirty)
    }

    /// Frees every slot.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = Slot::default());
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot<C>; N] {
        &mut self.slots
    }
}
