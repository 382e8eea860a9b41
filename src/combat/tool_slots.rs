//! Tool slots: exclusive equipment attachment points
//!
//! A slot bit is held by at most one item. Occupying is all-or-nothing:
//! if any requested bit is taken, nothing changes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::ItemId;

bitflags! {
    /// Body and hand attachment points
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ToolSlot: u32 {
        const HEAD = 1 << 1;
        const NECK = 1 << 2;
        const BODY = 1 << 3;
        const ROBE = 1 << 4;
        const LEFT_ARM = 1 << 5;
        const RIGHT_ARM = 1 << 6;
        const LEFT_HAND = 1 << 7;
        const RIGHT_HAND = 1 << 8;
        const WAIST = 1 << 9;
        const LEGS = 1 << 10;
        const LEFT_FOOT = 1 << 11;
        const RIGHT_FOOT = 1 << 12;
        const LEFT_FINGER = 1 << 13;
        const RIGHT_FINGER = 1 << 14;

        const ARMS = Self::LEFT_ARM.bits() | Self::RIGHT_ARM.bits();
        const BOTH_HANDS = Self::LEFT_HAND.bits() | Self::RIGHT_HAND.bits();
        const FEET = Self::LEFT_FOOT.bits() | Self::RIGHT_FOOT.bits();
    }
}

const SLOT_BITS: usize = 32;

/// A requested slot is already held
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("slot {slots:?} is occupied by item {blocker}")]
pub struct SlotConflict {
    pub slots: ToolSlot,
    pub blocker: ItemId,
}

/// Which item holds which slot bit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSlotRegistry {
    holders: [Option<ItemId>; SLOT_BITS],
}

impl ToolSlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bit_indices(slots: ToolSlot) -> impl Iterator<Item = usize> {
        let bits = slots.bits();
        (0..SLOT_BITS).filter(move |i| bits & (1 << i) != 0)
    }

    /// Give `item` exclusive ownership of every bit in `slots`
    ///
    /// Fails naming the first blocking item; on failure the registry is unchanged.
    /// Re-occupying bits the item already holds is allowed.
    pub fn occupy(&mut self, item: ItemId, slots: ToolSlot) -> Result<(), SlotConflict> {
        for i in Self::bit_indices(slots) {
            if let Some(holder) = self.holders[i] {
                if holder != item {
                    return Err(SlotConflict {
                        slots: ToolSlot::from_bits_retain(1 << i),
                        blocker: holder,
                    });
                }
            }
        }

        for i in Self::bit_indices(slots) {
            self.holders[i] = Some(item);
        }
        Ok(())
    }

    /// Clear every bit held by `item`, returning what was released
    pub fn release(&mut self, item: ItemId) -> ToolSlot {
        let mut released = ToolSlot::empty();
        for (i, holder) in self.holders.iter_mut().enumerate() {
            if *holder == Some(item) {
                *holder = None;
                released |= ToolSlot::from_bits_retain(1 << i);
            }
        }
        released
    }

    /// The single item holding every bit of `slots`
    ///
    /// None if any bit is free or the bits are split between items.
    pub fn query(&self, slots: ToolSlot) -> Option<ItemId> {
        let mut found = None;
        for i in Self::bit_indices(slots) {
            let holder = self.holders[i]?;
            match found {
                None => found = Some(holder),
                Some(previous) if previous != holder => return None,
                Some(_) => {}
            }
        }
        found
    }

    /// Slots held by `item`
    pub fn held_by(&self, item: ItemId) -> ToolSlot {
        let mut slots = ToolSlot::empty();
        for (i, holder) in self.holders.iter().enumerate() {
            if *holder == Some(item) {
                slots |= ToolSlot::from_bits_retain(1 << i);
            }
        }
        slots
    }

    /// Is any bit of `slots` held by anyone?
    pub fn any_occupied(&self, slots: ToolSlot) -> bool {
        Self::bit_indices(slots).any(|i| self.holders[i].is_some())
    }

    /// Every item holding at least one slot, without duplicates
    pub fn items(&self) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = Vec::new();
        for holder in self.holders.iter().flatten() {
            if !items.contains(holder) {
                items.push(*holder);
            }
        }
        items
    }

    pub fn is_empty(&self) -> bool {
        self.holders.iter().all(Option::is_none)
    }
}
