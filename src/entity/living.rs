//! The contract the combat core consumes from living entities
//!
//! Hit points, stats and skills are owned by the surrounding game. Combat
//! reads them, reduces hit points, spends fatigue and calls the death and
//! reward hooks; nothing else.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::combat::attack::AttackId;
use crate::core::types::{EntityId, ItemId, RoomId};

/// Primary stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stat {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Discipline,
}

impl Stat {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Skills consulted by combat, each on a 0..=100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Skill {
    Parry,
    Defense,
    UnarmedCombat,
    BlindFighting,
    TwoHandedCombat,
    Sword,
    Axe,
    Knife,
    Club,
    Polearm,
    Missiles,
}

/// A living entity as seen by the combat core
pub trait LivingEntity {
    fn id(&self) -> EntityId;
    fn name(&self) -> &str;

    fn stat_value(&self, stat: Stat) -> i32;
    fn skill_value(&self, skill: Skill) -> i32;

    /// Mean of all primary stats
    fn average_stat(&self) -> i32 {
        let total: i32 = Stat::iter().map(|s| self.stat_value(s)).sum();
        total / Stat::iter().count() as i32
    }

    fn hit_points(&self) -> i32;
    fn max_hit_points(&self) -> i32;
    fn reduce_hit_points(&mut self, amount: i32);

    fn fatigue(&self) -> i32;
    fn add_fatigue(&mut self, amount: i32);

    /// Dead entities linger as ghosts until the game removes them
    fn is_ghost(&self) -> bool;
    fn is_stunned(&self) -> bool;
    fn is_fumbling(&self) -> bool {
        false
    }
    /// Administrative accounts never take lethal damage
    fn is_wizard(&self) -> bool {
        false
    }
    /// Player-controlled as opposed to scripted
    fn is_interactive(&self) -> bool;
    /// Humanoids get the hand/foot attack set and attack-use redistribution
    fn is_humanoid(&self) -> bool {
        true
    }
    fn is_invisible(&self) -> bool {
        false
    }

    /// Rounds the entity still has to sit out
    fn attack_delay(&self) -> u32 {
        0
    }
    fn set_attack_delay(&mut self, _rounds: u32) {}

    /// Carried weight as a percentage of capacity
    fn encumbrance_weight(&self) -> i32;
    /// Carried volume as a percentage of capacity
    fn encumbrance_volume(&self) -> i32;

    fn location(&self) -> RoomId;
    fn set_location(&mut self, room: RoomId);
    /// False when blinded; room darkness is checked separately
    fn can_see_in_room(&self) -> bool {
        true
    }

    fn team(&self) -> Option<u32> {
        None
    }

    /// Flee when hit points drop below this share of maximum (0 disables)
    fn wimpy_percent(&self) -> i32 {
        0
    }

    fn inventory(&self) -> &[ItemId];
    fn add_to_inventory(&mut self, item: ItemId);
    fn remove_from_inventory(&mut self, item: ItemId) -> bool;

    /// Runs before the normal attacks of a round; `true` consumes the round
    fn special_attack(&mut self, _target: EntityId) -> bool {
        false
    }

    /// Veto one attack of this round
    fn veto_attack(&self, _target: EntityId, _attack: AttackId) -> bool {
        false
    }

    fn on_death(&mut self, killer: Option<EntityId>);

    /// Called on the attacker for every blow landed and once for a kill
    fn grant_combat_reward(&mut self, _victim: EntityId, _damage: i32, _was_kill: bool) {}
}
