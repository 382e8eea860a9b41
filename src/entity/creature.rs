//! A plain living entity: fixed stats, a skill sheet and a small inventory
//!
//! Used by the duel runner and the tests. Real games bring their own
//! `LivingEntity` implementation.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::core::types::{EntityId, ItemId, RoomId};
use crate::entity::living::{LivingEntity, Skill, Stat};

const STAT_COUNT: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creature {
    pub id: EntityId,
    pub name: String,
    pub stats: [i32; STAT_COUNT],
    pub skills: AHashMap<Skill, i32>,
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub fatigue: i32,
    pub location: RoomId,
    pub team: Option<u32>,
    pub inventory: Vec<ItemId>,
    pub interactive: bool,
    pub humanoid: bool,
    pub wizard: bool,
    pub stunned: bool,
    pub fumbling: bool,
    pub blind: bool,
    pub ghost: bool,
    pub wimpy: i32,
    pub attack_delay: u32,
    pub encumbrance: i32,
    /// Who dealt the killing blow, if anyone
    pub killed_by: Option<EntityId>,
    /// Accumulated combat experience
    pub experience: i64,
    pub kills: u32,
}

impl Creature {
    /// A humanoid with every stat at `average` and no skills
    pub fn humanoid(name: impl Into<String>, average: i32, location: RoomId) -> Self {
        let max_hit_points = hit_points_for(average);
        Self {
            id: EntityId::new(),
            name: name.into(),
            stats: [average; STAT_COUNT],
            skills: AHashMap::new(),
            hit_points: max_hit_points,
            max_hit_points,
            fatigue: 0,
            location,
            team: None,
            inventory: Vec::new(),
            interactive: false,
            humanoid: true,
            wizard: false,
            stunned: false,
            fumbling: false,
            blind: false,
            ghost: false,
            wimpy: 0,
            attack_delay: 0,
            encumbrance: 0,
            killed_by: None,
            experience: 0,
            kills: 0,
        }
    }

    /// A non-humanoid beast; its attacks and hit locations are configured by hand
    pub fn beast(name: impl Into<String>, average: i32, location: RoomId) -> Self {
        Self {
            humanoid: false,
            ..Self::humanoid(name, average, location)
        }
    }

    pub fn with_skill(mut self, skill: Skill, value: i32) -> Self {
        self.skills.insert(skill, value);
        self
    }

    pub fn with_stat(mut self, stat: Stat, value: i32) -> Self {
        self.stats[stat.index()] = value;
        if stat == Stat::Constitution {
            self.max_hit_points = hit_points_for(value);
            self.hit_points = self.max_hit_points;
        }
        self
    }

    pub fn with_team(mut self, team: u32) -> Self {
        self.team = Some(team);
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Set every combat skill to the same value
    pub fn trained(mut self, value: i32) -> Self {
        for skill in Skill::iter() {
            self.skills.insert(skill, value);
        }
        self
    }
}

fn hit_points_for(constitution: i32) -> i32 {
    20 + constitution.max(1) * 5
}

impl LivingEntity for Creature {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stat_value(&self, stat: Stat) -> i32 {
        self.stats[stat.index()]
    }

    fn skill_value(&self, skill: Skill) -> i32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    fn hit_points(&self) -> i32 {
        self.hit_points
    }

    fn max_hit_points(&self) -> i32 {
        self.max_hit_points
    }

    fn reduce_hit_points(&mut self, amount: i32) {
        self.hit_points -= amount.max(0);
    }

    fn fatigue(&self) -> i32 {
        self.fatigue
    }

    fn add_fatigue(&mut self, amount: i32) {
        self.fatigue = (self.fatigue + amount).max(0);
    }

    fn is_ghost(&self) -> bool {
        self.ghost
    }

    fn is_stunned(&self) -> bool {
        self.stunned
    }

    fn is_fumbling(&self) -> bool {
        self.fumbling
    }

    fn is_wizard(&self) -> bool {
        self.wizard
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn is_humanoid(&self) -> bool {
        self.humanoid
    }

    fn attack_delay(&self) -> u32 {
        self.attack_delay
    }

    fn set_attack_delay(&mut self, rounds: u32) {
        self.attack_delay = rounds;
    }

    fn encumbrance_weight(&self) -> i32 {
        self.encumbrance
    }

    fn encumbrance_volume(&self) -> i32 {
        self.encumbrance
    }

    fn location(&self) -> RoomId {
        self.location
    }

    fn set_location(&mut self, room: RoomId) {
        self.location = room;
    }

    fn can_see_in_room(&self) -> bool {
        !self.blind
    }

    fn team(&self) -> Option<u32> {
        self.team
    }

    fn wimpy_percent(&self) -> i32 {
        self.wimpy
    }

    fn inventory(&self) -> &[ItemId] {
        &self.inventory
    }

    fn add_to_inventory(&mut self, item: ItemId) {
        if !self.inventory.contains(&item) {
            self.inventory.push(item);
        }
    }

    fn remove_from_inventory(&mut self, item: ItemId) -> bool {
        match self.inventory.iter().position(|i| *i == item) {
            Some(pos) => {
                self.inventory.remove(pos);
                true
            }
            None => false,
        }
    }

    fn on_death(&mut self, killer: Option<EntityId>) {
        self.ghost = true;
        self.killed_by = killer;
    }

    fn grant_combat_reward(&mut self, _victim: EntityId, damage: i32, was_kill: bool) {
        self.experience += i64::from(damage.max(0));
        if was_kill {
            self.kills += 1;
            self.experience += 100;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_stat() {
        let c = Creature::humanoid("Tova", 20, RoomId(1)).with_stat(Stat::Strength, 26);
        assert_eq!(c.average_stat(), 21);
    }

    #[test]
    fn test_constitution_sets_hit_points() {
        let c = Creature::humanoid("Tova", 20, RoomId(1)).with_stat(Stat::Constitution, 40);
        assert_eq!(c.max_hit_points(), 220);
        assert_eq!(c.hit_points(), 220);
    }

    #[test]
    fn test_missing_skill_is_zero() {
        let c = Creature::humanoid("Tova", 20, RoomId(1)).with_skill(Skill::Parry, 30);
        assert_eq!(c.skill_value(Skill::Parry), 30);
        assert_eq!(c.skill_value(Skill::Axe), 0);
    }

    #[test]
    fn test_inventory_round_trip() {
        let mut c = Creature::humanoid("Tova", 20, RoomId(1));
        c.add_to_inventory(ItemId(3));
        c.add_to_inventory(ItemId(3));
        assert_eq!(c.inventory().len(), 1);
        assert!(c.remove_from_inventory(ItemId(3)));
        assert!(!c.remove_from_inventory(ItemId(3)));
    }

    #[test]
    fn test_death_records_killer() {
        let mut c = Creature::humanoid("Tova", 20, RoomId(1));
        let killer = EntityId::new();
        c.on_death(Some(killer));
        assert!(c.is_ghost());
        assert_eq!(c.killed_by, Some(killer));
    }
}
