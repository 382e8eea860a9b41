//! Attack table: the attacks one combatant can make each round
//!
//! Fixed capacity, addressed by a stable `AttackId`. Records are upserted
//! in place so iteration order stays the insertion order.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::combat::constants::MAX_ATTACKS;
use crate::combat::damage::{DamageType, Penetration};
use crate::combat::resolution::modified_penetration;
use crate::combat::tool_slots::ToolSlot;
use crate::core::error::{CombatError, Result};
use crate::core::types::ItemId;

/// Stable attack identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackId {
    RightHand,
    LeftHand,
    BothHands,
    RightFoot,
    LeftFoot,
    /// Bites, claws, tails: numbered per creature
    Natural(u8),
}

impl AttackId {
    /// The unarmed humanoid attack set, in round order
    pub fn humanoid() -> [AttackId; 4] {
        [
            AttackId::RightHand,
            AttackId::LeftHand,
            AttackId::RightFoot,
            AttackId::LeftFoot,
        ]
    }

    /// Tool slots backing this attack
    pub fn slot(self) -> ToolSlot {
        match self {
            AttackId::RightHand => ToolSlot::RIGHT_HAND,
            AttackId::LeftHand => ToolSlot::LEFT_HAND,
            AttackId::BothHands => ToolSlot::BOTH_HANDS,
            AttackId::RightFoot => ToolSlot::RIGHT_FOOT,
            AttackId::LeftFoot => ToolSlot::LEFT_FOOT,
            AttackId::Natural(_) => ToolSlot::empty(),
        }
    }

    /// Inverse of `slot` for wielding
    pub fn for_slots(slots: ToolSlot) -> Option<AttackId> {
        if slots == ToolSlot::BOTH_HANDS {
            Some(AttackId::BothHands)
        } else if slots == ToolSlot::RIGHT_HAND {
            Some(AttackId::RightHand)
        } else if slots == ToolSlot::LEFT_HAND {
            Some(AttackId::LeftHand)
        } else {
            None
        }
    }

    pub fn is_hand(self) -> bool {
        matches!(
            self,
            AttackId::RightHand | AttackId::LeftHand | AttackId::BothHands
        )
    }
}

impl fmt::Display for AttackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackId::RightHand => write!(f, "right hand"),
            AttackId::LeftHand => write!(f, "left hand"),
            AttackId::BothHands => write!(f, "both hands"),
            AttackId::RightFoot => write!(f, "right foot"),
            AttackId::LeftFoot => write!(f, "left foot"),
            AttackId::Natural(n) => write!(f, "attack {}", n),
        }
    }
}

/// One attack record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    pub id: AttackId,
    /// Weapon class to-hit
    pub to_hit: i32,
    /// Raw penetration per damage type
    pub penetration: Penetration,
    pub damage_type: DamageType,
    /// Chance (0..=100) the attack is used in a round
    pub use_probability: i32,
    /// Skill level backing the attack
    pub skill: i32,
    /// Penetration after skill and strength scaling
    pub modified_penetration: Penetration,
    /// Wielded weapon, borrowed from the item arena
    pub weapon: Option<ItemId>,
    /// Word used in combat messages ("right hand", "longsword", "bite")
    pub label: String,
}

impl Attack {
    pub fn new(
        id: AttackId,
        to_hit: i32,
        penetration: Penetration,
        damage_type: DamageType,
        use_probability: i32,
    ) -> Self {
        Self {
            id,
            to_hit,
            penetration,
            damage_type,
            use_probability: use_probability.clamp(0, 100),
            skill: 0,
            modified_penetration: penetration,
            weapon: None,
            label: id.to_string(),
        }
    }

    pub fn with_skill(mut self, skill: i32) -> Self {
        self.skill = skill;
        self
    }

    pub fn with_weapon(mut self, weapon: ItemId) -> Self {
        self.weapon = Some(weapon);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_armed(&self) -> bool {
        self.weapon.is_some()
    }
}

/// Fixed-capacity table of attacks
#[derive(Debug, Clone, Default)]
pub struct AttackTable {
    attacks: ArrayVec<Attack, MAX_ATTACKS>,
}

impl AttackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the attack at `attack.id`, recomputing its modified penetration
    pub fn add_attack(&mut self, mut attack: Attack, strength: i32) -> Result<()> {
        attack.modified_penetration =
            modified_penetration(attack.penetration, attack.skill, strength);

        if let Some(existing) = self.attacks.iter_mut().find(|a| a.id == attack.id) {
            *existing = attack;
            return Ok(());
        }

        self.attacks
            .try_push(attack)
            .map_err(|_| CombatError::TableFull(MAX_ATTACKS))
    }

    /// Remove an attack; removing a missing id is a no-op
    pub fn remove_attack(&mut self, id: AttackId) -> Option<Attack> {
        let pos = self.attacks.iter().position(|a| a.id == id)?;
        Some(self.attacks.remove(pos))
    }

    pub fn query(&self, id: AttackId) -> Option<&Attack> {
        self.attacks.iter().find(|a| a.id == id)
    }

    pub fn query_mut(&mut self, id: AttackId) -> Option<&mut Attack> {
        self.attacks.iter_mut().find(|a| a.id == id)
    }

    /// Every attack, in insertion order
    pub fn all(&self) -> &[Attack] {
        &self.attacks
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Attack> {
        self.attacks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    /// Any attack backed by a weapon?
    pub fn is_armed(&self) -> bool {
        self.attacks.iter().any(Attack::is_armed)
    }

    /// Recompute every modified penetration, e.g. after a strength change
    pub fn recompute(&mut self, strength: i32) {
        for attack in self.attacks.iter_mut() {
            attack.modified_penetration =
                modified_penetration(attack.penetration, attack.skill, strength);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn punch(id: AttackId) -> Attack {
        Attack::new(id, 20, Penetration::uniform(10), DamageType::BLUDGEON, 50)
    }

    #[test]
    fn test_add_then_query() {
        let mut table = AttackTable::new();
        table.add_attack(punch(AttackId::RightHand), 20).unwrap();
        let attack = table.query(AttackId::RightHand).unwrap();
        assert_eq!(attack.to_hit, 20);
        assert_eq!(attack.label, "right hand");
        assert!(table.query(AttackId::LeftFoot).is_none());
    }

    #[test]
    fn test_add_replaces_in_place() {
        let mut table = AttackTable::new();
        table.add_attack(punch(AttackId::RightHand), 20).unwrap();
        table.add_attack(punch(AttackId::LeftHand), 20).unwrap();

        let mut stronger = punch(AttackId::RightHand);
        stronger.to_hit = 35;
        table.add_attack(stronger, 20).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.all()[0].id, AttackId::RightHand);
        assert_eq!(table.all()[0].to_hit, 35);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut table = AttackTable::new();
        table.add_attack(punch(AttackId::RightFoot), 20).unwrap();
        assert!(table.remove_attack(AttackId::RightFoot).is_some());
        assert!(table.remove_attack(AttackId::RightFoot).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_capacity_bounded() {
        let mut table = AttackTable::new();
        for n in 0..MAX_ATTACKS as u8 {
            table.add_attack(punch(AttackId::Natural(n)), 20).unwrap();
        }
        let overflow = table.add_attack(punch(AttackId::Natural(200)), 20);
        assert!(matches!(overflow, Err(CombatError::TableFull(_))));
        // Replacing an existing id still works when full
        assert!(table.add_attack(punch(AttackId::Natural(0)), 20).is_ok());
    }

    #[test]
    fn test_modified_penetration_tracks_skill() {
        let mut table = AttackTable::new();
        table.add_attack(punch(AttackId::RightHand), 20).unwrap();
        table
            .add_attack(punch(AttackId::LeftHand).with_skill(80), 20)
            .unwrap();
        let novice = table.query(AttackId::RightHand).unwrap().modified_penetration;
        let expert = table.query(AttackId::LeftHand).unwrap().modified_penetration;
        assert!(expert.bludgeon > novice.bludgeon);
    }

    #[test]
    fn test_slot_mapping_round_trip() {
        for id in [AttackId::RightHand, AttackId::LeftHand, AttackId::BothHands] {
            assert_eq!(AttackId::for_slots(id.slot()), Some(id));
        }
        assert_eq!(AttackId::for_slots(ToolSlot::HEAD), None);
    }
}
