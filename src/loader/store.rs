//! Sparse table of decoded frames.
//!
//! Every slot is written at most once by the loader and read many times by the
//! render loop. In progressive mode the render loop falls back to the nearest
//! ready frame *after* the requested one while later tiers are still streaming in.

use crate::decoder::Bitmap;

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Pending,
    Ready(Bitmap),
    Absent,
}

#[derive(Debug, Default)]
pub struct FrameStore {
    slots: Vec<Slot>,
}

impl FrameStore {
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![Slot::Pending; total],
        }
    }

    /// Drop everything and size the table for a fresh load.
    pub fn reset(&mut self, total: usize) {
        self.slots.clear();
        self.slots.resize(total, Slot::Pending);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn insert(&mut self, index: usize, bitmap: Bitmap) {
        self.fill(index, Slot::Ready(bitmap));
    }

    pub fn mark_absent(&mut self, index: usize) {
        self.fill(index, Slot::Absent);
    }

    fn fill(&mut self, index: usize, value: Slot) {
        let len = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) if matches!(slot, Slot::Pending) => *slot = value,
            Some(_) => log::warn!("Frame {} already stored, ignoring second write", index),
            None => log::warn!("Frame {} outside store of {} slots", index, len),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Bitmap> {
        match self.slots.get(index) {
            Some(Slot::Ready(bitmap)) => Some(bitmap),
            _ => None,
        }
    }

    pub fn is_absent(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Absent))
    }

    /// Nearest ready frame at or after `index`, with the index actually found.
    pub fn nearest_at_or_after(&self, index: usize) -> Option<(usize, &Bitmap)> {
        self.slots
            .iter()
            .enumerate()
            .skip(index)
            .find_map(|(i, slot)| match slot {
                Slot::Ready(bitmap) => Some((i, bitmap)),
                _ => None,
            })
    }

    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Remove every slot without a bitmap, shifting later frames down.
    /// Returns the new length.
    pub fn compact(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| matches!(slot, Slot::Ready(_)));
        if self.slots.len() != before {
            log::info!(
                "Pruned {} empty frames ({} -> {})",
                before - self.slots.len(),
                before,
                self.slots.len()
            );
        }
        self.slots.len()
    }
}
