// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Fixed-position scratch words carried across a hand-off.

/// Positions of the scratch words. The numbering is an ABI shared by every stage.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
pub enum Slot {
    /// Offset of the L3 header
    HdrOff = 0,
    /// Traffic direction
    Direction = 1,
    /// Source security label
    SrcLabel = 2,
    /// Cluster id
    ClusterId = 3,
    /// NAT flag bits
    NatFlags = 4,
}

/// Number of scratch words.
pub const SCRATCH_SLOTS: usize = <Slot as strum::EnumCount>::COUNT;

/// The scratch words of one packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchSlots([u32; SCRATCH_SLOTS]);

impl ScratchSlots {
    /// Write a slot.
    pub fn store(&mut self, slot: Slot, value: u32) {
        self.0[slot as usize] = value;
    }

    /// Read a slot without consuming it.
    #[must_use]
    pub fn peek(&self, slot: Slot) -> u32 {
        self.0[slot as usize]
    }

    /// Read a slot and reset it to zero.
    pub fn load_and_clear(&mut self, slot: Slot) -> u32 {
        std::mem::take(&mut self.0[slot as usize])
    }

    /// True when no slot holds a value.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }
}

#[cfg(test)]
mod test {
    use super::{ScratchSlots, Slot};

    #[test]
    fn load_and_clear_consumes() {
        let mut slots = ScratchSlots::default();
        slots.store(Slot::HdrOff, 14);
        slots.store(Slot::ClusterId, 9);
        assert_eq!(slots.peek(Slot::HdrOff), 14);
        assert_eq!(slots.load_and_clear(Slot::HdrOff), 14);
        assert_eq!(slots.load_and_clear(Slot::HdrOff), 0);
        assert!(!slots.is_clear());
        assert_eq!(slots.load_and_clear(Slot::ClusterId), 9);
        assert!(slots.is_clear());
    }
}
