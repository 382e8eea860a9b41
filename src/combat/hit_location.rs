//! Hit locations: where a blow lands and how well that spot is armoured
//!
//! The hit probabilities of one combatant's locations sum to 100.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::combat::constants::{MAX_HIT_LOCATIONS, TOTAL_HIT_PROBABILITY};
use crate::combat::damage::ArmorClass;
use crate::core::error::{CombatError, Result};
use crate::core::types::ItemId;

/// Stable hit location identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationId {
    Head,
    Body,
    Arms,
    Legs,
    /// Tails, wings, tentacles: numbered per creature
    Other(u8),
}

impl LocationId {
    /// Humanoid locations with their hit probabilities (sums to 100)
    pub fn humanoid() -> [(LocationId, i32, &'static str); 4] {
        [
            (LocationId::Head, 15, "head"),
            (LocationId::Body, 45, "body"),
            (LocationId::Arms, 20, "arms"),
            (LocationId::Legs, 20, "legs"),
        ]
    }
}

/// One body region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitLocation {
    pub id: LocationId,
    /// Natural armour class before anything is worn
    pub armor_class: ArmorClass,
    /// Share of blows that land here
    pub hit_probability: i32,
    pub description: String,
    /// Natural armour plus every covering piece
    pub modified_armor_class: ArmorClass,
    /// Armour pieces covering this spot and what each contributes.
    /// The pieces themselves belong to the wearer's equipment.
    pub covering: Vec<(ItemId, ArmorClass)>,
}

impl HitLocation {
    pub fn new(
        id: LocationId,
        armor_class: ArmorClass,
        hit_probability: i32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            armor_class,
            hit_probability: hit_probability.max(0),
            description: description.into(),
            modified_armor_class: armor_class,
            covering: Vec::new(),
        }
    }

    fn recompute(&mut self) {
        let worn = self
            .covering
            .iter()
            .fold(ArmorClass::default(), |acc, (_, ac)| acc + *ac);
        let total = self.armor_class + worn;
        self.modified_armor_class =
            ArmorClass::new(total.impale.max(0), total.slash.max(0), total.bludgeon.max(0));
    }

    pub fn is_covered_by(&self, armor: ItemId) -> bool {
        self.covering.iter().any(|(id, _)| *id == armor)
    }
}

/// Fixed-capacity table of hit locations
#[derive(Debug, Clone, Default)]
pub struct HitLocationTable {
    locations: ArrayVec<HitLocation, MAX_HIT_LOCATIONS>,
}

impl HitLocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard humanoid body with a uniform natural armour class
    pub fn humanoid(natural_ac: i32) -> Self {
        let mut table = Self::new();
        for (id, probability, description) in LocationId::humanoid() {
            // Capacity exceeds the humanoid set
            let _ = table.add_hit_location(HitLocation::new(
                id,
                ArmorClass::uniform(natural_ac),
                probability,
                description,
            ));
        }
        table
    }

    /// Insert or replace the location at `location.id`
    ///
    /// Armour already covering a replaced location stays in place.
    pub fn add_hit_location(&mut self, mut location: HitLocation) -> Result<()> {
        if let Some(existing) = self.locations.iter_mut().find(|l| l.id == location.id) {
            location.covering = std::mem::take(&mut existing.covering);
            location.recompute();
            *existing = location;
            return Ok(());
        }

        location.recompute();
        self.locations
            .try_push(location)
            .map_err(|_| CombatError::TableFull(MAX_HIT_LOCATIONS))
    }

    /// Remove a location; removing a missing id is a no-op
    pub fn remove_hit_location(&mut self, id: LocationId) -> Option<HitLocation> {
        let pos = self.locations.iter().position(|l| l.id == id)?;
        Some(self.locations.remove(pos))
    }

    pub fn query(&self, id: LocationId) -> Option<&HitLocation> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Every location, in insertion order
    pub fn all(&self) -> &[HitLocation] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn total_probability(&self) -> i32 {
        self.locations.iter().map(|l| l.hit_probability).sum()
    }

    /// Check the probabilities sum to 100; Err carries the actual total
    pub fn validate(&self) -> std::result::Result<(), i32> {
        let total = self.total_probability();
        if total == TOTAL_HIT_PROBABILITY {
            Ok(())
        } else {
            Err(total)
        }
    }

    /// Make the last location absorb any difference from 100
    ///
    /// Returns true if the table was changed.
    pub fn normalize(&mut self) -> bool {
        let total = self.total_probability();
        if total == TOTAL_HIT_PROBABILITY {
            return false;
        }
        let Some(last) = self.locations.last_mut() else {
            return false;
        };
        let others = total - last.hit_probability;
        let wanted = TOTAL_HIT_PROBABILITY - others;
        if wanted >= 0 {
            last.hit_probability = wanted;
        } else {
            // Earlier locations already exceed 100: scale them all down
            let mut remaining = TOTAL_HIT_PROBABILITY;
            let count = self.locations.len();
            for (i, location) in self.locations.iter_mut().enumerate() {
                if i + 1 == count {
                    location.hit_probability = remaining;
                } else {
                    location.hit_probability =
                        location.hit_probability * TOTAL_HIT_PROBABILITY / total;
                    remaining -= location.hit_probability;
                }
            }
        }
        true
    }

    /// Add (or with `removing`, subtract) an armour piece's contribution at one location
    ///
    /// Returns false if the location does not exist. Adding a piece twice
    /// replaces its earlier contribution.
    pub fn adjust_armor_class(
        &mut self,
        id: LocationId,
        armor: ItemId,
        contribution: ArmorClass,
        removing: bool,
    ) -> bool {
        let Some(location) = self.locations.iter_mut().find(|l| l.id == id) else {
            return false;
        };

        location.covering.retain(|(item, _)| *item != armor);
        if !removing {
            location.covering.push((armor, contribution));
        }
        location.recompute();
        true
    }

    /// Locations a given armour piece currently covers
    pub fn covered_by(&self, armor: ItemId) -> Vec<LocationId> {
        self.locations
            .iter()
            .filter(|l| l.is_covered_by(armor))
            .map(|l| l.id)
            .collect()
    }
}
