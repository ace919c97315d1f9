//! Active-slot table
//!
//! The render path only looks at sources parked here. Capacity is fixed at
//! `MAX_SOURCES`; a source activated while the table is full keeps its
//! PLAYING/PAUSED state but is not rendered.

use super::handle::SourceId;
use crate::types::MAX_SOURCES;

#[derive(Debug, Default)]
pub(crate) struct ActiveSlots {
    slots: [Option<SourceId>; MAX_SOURCES],
}

impl ActiveSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot holding `id`, if any
    pub fn position(&self, id: SourceId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(id))
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.position(id).is_some()
    }

    /// Park `id` in the first free slot
    ///
    /// Returns the slot index, or `None` when the table is full or `id` was
    /// already present (both logged).
    pub fn activate(&mut self, id: SourceId) -> Option<usize> {
        if let Some(slot) = self.position(id) {
            log::debug!("source_activate(): source already active in slot {}", slot);
            return None;
        }
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(id);
                Some(slot)
            }
            None => {
                log::debug!("source_activate(): no more slots available (max={})", MAX_SOURCES);
                None
            }
        }
    }

    /// Remove `id`; returns whether it was present
    pub fn deactivate(&mut self, id: SourceId) -> bool {
        match self.position(id) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => {
                log::debug!("source_deactivate(): source not active");
                false
            }
        }
    }

    /// Occupant of slot `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<SourceId> {
        self.slots[index]
    }

    /// Empty slot `index` (render path, slot already known)
    #[inline]
    pub fn clear(&mut self, index: usize) {
        self.slots[index] = None;
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.slots.iter().flatten().copied()
    }
}
