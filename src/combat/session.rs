//! Combat session: the per-combatant controller
//!
//! A session owns the attack and hit location tables, the tool slot
//! registry, the enemy list, the current target and the panic level of one
//! entity. It never reaches into another session; the arena moves effects
//! between sessions through its public entry points.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::combat::armor::Armor;
use crate::combat::attack::{Attack, AttackId, AttackTable};
use crate::combat::damage::{DamageType, Penetration};
use crate::combat::hit_location::{HitLocationTable, LocationId};
use crate::combat::messages::condition;
use crate::combat::morale::Panic;
use crate::combat::resolution::redistribute_attack_use;
use crate::combat::tool_slots::{SlotConflict, ToolSlotRegistry};
use crate::combat::weapons::Weapon;
use crate::core::config::CombatConfig;
use crate::core::types::{EntityId, ItemId, Tick};
use crate::simulation::heartbeat::TaskHandle;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No enemies, no heartbeat
    Idle,
    /// Heartbeat running with a target in reach
    Engaged,
    /// Enemies remembered but none in reach
    Hunting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Enemy {
    id: EntityId,
    since: u64,
}

/// Skill values that shape a wielded attack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WieldSkills {
    /// Skill of the weapon's family
    pub weapon: i32,
    pub two_handed: i32,
    pub unarmed: i32,
    pub strength: i32,
}

#[derive(Debug)]
pub struct CombatSession {
    pub owner: EntityId,
    pub attacks: AttackTable,
    pub hit_locations: HitLocationTable,
    pub slots: ToolSlotRegistry,
    pub panic: Panic,
    pub state: SessionState,
    /// Ignore bare hands and feet while a weapon is wielded
    pub unarmed_disabled: bool,
    /// Tables were set up by the host; keep the session across teardown
    pub configured: bool,
    /// Tick of the last blow given or received
    pub last_exchange: Tick,
    pub rounds: u32,
    pub heartbeat: Option<TaskHandle>,
    pub teardown: Option<TaskHandle>,
    enemies: Vec<Enemy>,
    enemy_seq: u64,
    target: Option<EntityId>,
    wielded: Vec<ItemId>,
    worn: Vec<ItemId>,
}

impl CombatSession {
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            attacks: AttackTable::new(),
            hit_locations: HitLocationTable::new(),
            slots: ToolSlotRegistry::new(),
            panic: Panic::new(),
            state: SessionState::Idle,
            unarmed_disabled: false,
            configured: false,
            last_exchange: 0,
            rounds: 0,
            heartbeat: None,
            teardown: None,
            enemies: Vec::new(),
            enemy_seq: 0,
            target: None,
            wielded: Vec::new(),
            worn: Vec::new(),
        }
    }

    /// Session with the humanoid attack set and body
    pub fn humanoid(owner: EntityId, skills: WieldSkills, config: &CombatConfig) -> Self {
        let mut session = Self::new(owner);
        session.hit_locations = HitLocationTable::humanoid(0);
        for id in AttackId::humanoid() {
            let attack = Self::unarmed_attack(id, skills.unarmed, config);
            // Capacity exceeds the humanoid set
            let _ = session.attacks.add_attack(attack, skills.strength);
        }
        session.redistribute(config.humanoid_attack_budget, |_| false);
        session
    }

    /// Bare hand or foot
    pub fn unarmed_attack(id: AttackId, unarmed: i32, config: &CombatConfig) -> Attack {
        Attack::new(
            id,
            config.unarmed_hit_base + unarmed / 2,
            Penetration::new(0, 0, config.unarmed_pen_base + unarmed / 5),
            DamageType::BLUDGEON,
            0,
        )
        .with_skill(unarmed)
    }

    // === ENEMIES AND TARGET ===

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target;
    }

    /// Enemies, most important first (forced attacks at the front)
    pub fn enemies(&self) -> Vec<EntityId> {
        self.enemies.iter().map(|e| e.id).collect()
    }

    pub fn is_enemy(&self, id: EntityId) -> bool {
        self.enemies.iter().any(|e| e.id == id)
    }

    pub fn has_enemies(&self) -> bool {
        !self.enemies.is_empty()
    }

    /// Remember `id` as an enemy; a forced enemy moves to the front
    ///
    /// Beyond `cap` the longest-remembered enemy other than `id` is forgotten
    /// and returned.
    pub fn add_enemy(&mut self, id: EntityId, forced: bool, cap: usize) -> Option<EntityId> {
        self.enemy_seq += 1;
        let since = self.enemy_seq;

        if let Some(pos) = self.enemies.iter().position(|e| e.id == id) {
            if forced && pos != 0 {
                let enemy = self.enemies.remove(pos);
                self.enemies.insert(0, enemy);
            }
            return None;
        }

        let enemy = Enemy { id, since };
        if forced {
            self.enemies.insert(0, enemy);
        } else {
            self.enemies.push(enemy);
        }

        if self.enemies.len() <= cap.max(1) {
            return None;
        }
        let oldest = self
            .enemies
            .iter()
            .enumerate()
            .filter(|(_, e)| e.id != id)
            .min_by_key(|(_, e)| e.since)
            .map(|(i, _)| i)?;
        let dropped = self.enemies.remove(oldest).id;
        if self.target == Some(dropped) {
            self.target = None;
        }
        Some(dropped)
    }

    pub fn remove_enemy(&mut self, id: EntityId) -> bool {
        let before = self.enemies.len();
        self.enemies.retain(|e| e.id != id);
        if self.target == Some(id) {
            self.target = None;
        }
        self.enemies.len() != before
    }

    /// `attack(target)` on this side
    pub fn attack(&mut self, target: EntityId, forced: bool, cap: usize) {
        self.add_enemy(target, forced, cap);
        self.target = Some(target);
    }

    /// Someone attacked us; switch to them only when `prefer_attacker` says so
    pub fn attacked_by(&mut self, attacker: EntityId, prefer_attacker: bool, cap: usize) {
        self.add_enemy(attacker, false, cap);
        if self.target.is_none() || prefer_attacker {
            self.target = Some(attacker);
        }
    }

    /// Forget `ids`; returns true if the current target was among them
    pub fn stop_fighting(&mut self, ids: &[EntityId]) -> bool {
        let had_target = self.target.is_some_and(|t| ids.contains(&t));
        for id in ids {
            self.remove_enemy(*id);
        }
        had_target
    }

    pub fn clear_enemies(&mut self) {
        self.enemies.clear();
        self.target = None;
    }

    // === EQUIPMENT ===

    pub fn wielded(&self) -> &[ItemId] {
        &self.wielded
    }

    pub fn worn(&self) -> &[ItemId] {
        &self.worn
    }

    pub fn is_armed(&self) -> bool {
        self.attacks.is_armed()
    }

    /// Wield a weapon in the first free slot its hands allow
    ///
    /// On conflict nothing changes and the first blocker is reported.
    pub fn wield(
        &mut self,
        item: ItemId,
        weapon: &dyn Weapon,
        skills: WieldSkills,
        config: &CombatConfig,
    ) -> Result<AttackId, SlotConflict> {
        let mut conflict = None;
        let mut chosen = None;
        for slots in weapon.hands().candidates() {
            match self.slots.occupy(item, *slots) {
                Ok(()) => {
                    chosen = Some(*slots);
                    break;
                }
                Err(err) => {
                    conflict.get_or_insert(err);
                }
            }
        }

        let Some(slots) = chosen else {
            return Err(conflict.unwrap_or(SlotConflict {
                slots: weapon.slots(),
                blocker: item,
            }));
        };

        let id = AttackId::for_slots(slots).unwrap_or(AttackId::RightHand);
        if id == AttackId::BothHands {
            self.attacks.remove_attack(AttackId::RightHand);
            self.attacks.remove_attack(AttackId::LeftHand);
        }
        if !self.wielded.contains(&item) {
            self.wielded.push(item);
        }
        self.install_weapon(id, item, weapon, skills);
        self.redistribute_default(config);
        Ok(id)
    }

    fn install_weapon(
        &mut self,
        id: AttackId,
        item: ItemId,
        weapon: &dyn Weapon,
        skills: WieldSkills,
    ) {
        let attack = Attack::new(
            id,
            weapon.to_hit(),
            weapon.penetration(),
            weapon.damage_type(),
            0,
        )
        .with_skill(skills.weapon)
        .with_weapon(item)
        .with_label(weapon.name());
        let attack = self.off_hand_penalty(attack, skills);
        if let Err(err) = self.attacks.add_attack(attack, skills.strength) {
            tracing::warn!(owner = %self.owner, %item, error = %err, "weapon attack not installed");
        }
    }

    /// Off-hand weapon loses to-hit unless trained in two-handed combat
    fn off_hand_penalty(&self, mut attack: Attack, skills: WieldSkills) -> Attack {
        let main_armed = self
            .attacks
            .query(AttackId::RightHand)
            .is_some_and(Attack::is_armed);
        if attack.id == AttackId::LeftHand && main_armed {
            let factor = 50 + skills.two_handed.clamp(0, 100) / 2;
            attack.to_hit = attack.to_hit * factor / 100;
        }
        attack
    }

    /// Stop wielding `item`, restoring bare hands to the slots it held
    pub fn unwield(&mut self, item: ItemId, skills: WieldSkills, config: &CombatConfig) -> bool {
        if !self.wielded.contains(&item) {
            return false;
        }
        let released = self.slots.release(item);
        self.wielded.retain(|w| *w != item);

        let held_by_weapon: Vec<AttackId> = self
            .attacks
            .all()
            .iter()
            .filter(|a| a.weapon == Some(item))
            .map(|a| a.id)
            .collect();
        for id in held_by_weapon {
            self.attacks.remove_attack(id);
        }

        for hand in [AttackId::RightHand, AttackId::LeftHand] {
            if released.intersects(hand.slot()) && self.attacks.query(hand).is_none() {
                let attack = Self::unarmed_attack(hand, skills.unarmed, config);
                let _ = self.attacks.add_attack(attack, skills.strength);
            }
        }
        self.redistribute_default(config);
        true
    }

    /// Refresh the attack backed by `item` after its properties changed
    pub fn update_weapon(
        &mut self,
        item: ItemId,
        weapon: &dyn Weapon,
        skills: WieldSkills,
        config: &CombatConfig,
    ) -> bool {
        let Some(id) = self
            .attacks
            .all()
            .iter()
            .find(|a| a.weapon == Some(item))
            .map(|a| a.id)
        else {
            return false;
        };
        self.install_weapon(id, item, weapon, skills);
        self.redistribute_default(config);
        true
    }

    /// Wear armour: occupy its slots and add its class to covered locations
    pub fn wear(
        &mut self,
        item: ItemId,
        armor: &dyn Armor,
    ) -> Result<Vec<LocationId>, SlotConflict> {
        self.slots.occupy(item, armor.slots())?;
        if !self.worn.contains(&item) {
            self.worn.push(item);
        }
        Ok(self.cover(item, armor))
    }

    fn cover(&mut self, item: ItemId, armor: &dyn Armor) -> Vec<LocationId> {
        let ac = armor.armor_class();
        armor
            .covers()
            .iter()
            .copied()
            .filter(|loc| self.hit_locations.adjust_armor_class(*loc, item, ac, false))
            .collect()
    }

    /// Take armour off: release its slots and subtract its class
    pub fn remove_armor(&mut self, item: ItemId) -> bool {
        if !self.worn.contains(&item) {
            return false;
        }
        self.slots.release(item);
        self.worn.retain(|w| *w != item);
        for loc in self.hit_locations.covered_by(item) {
            self.hit_locations
                .adjust_armor_class(loc, item, Default::default(), true);
        }
        true
    }

    /// Recompute armour contributions after the piece changed
    pub fn update_armor(&mut self, item: ItemId, armor: &dyn Armor) -> bool {
        if !self.worn.contains(&item) {
            return false;
        }
        for loc in self.hit_locations.covered_by(item) {
            self.hit_locations
                .adjust_armor_class(loc, item, Default::default(), true);
        }
        self.cover(item, armor);
        true
    }

    fn redistribute_default(&mut self, config: &CombatConfig) {
        // Callers with item knowledge redistribute again with blockers
        self.redistribute(config.humanoid_attack_budget, |_| false);
    }

    /// Spread the attack budget across usable attacks
    ///
    /// `blocks` reports whether a held item stops the bare attack of its slot.
    pub fn redistribute<F>(&mut self, budget: i32, blocks: F)
    where
        F: Fn(ItemId) -> bool,
    {
        let armed = self.is_armed();
        let unarmed_disabled = self.unarmed_disabled;
        let slots = &self.slots;
        redistribute_attack_use(&mut self.attacks, budget, |attack| {
            if attack.is_armed() {
                return true;
            }
            if unarmed_disabled && armed {
                return false;
            }
            let slot = attack.id.slot();
            if slot.is_empty() {
                return true;
            }
            match slots.query(slot) {
                None => !slots.any_occupied(slot),
                Some(holder) => !blocks(holder),
            }
        });
    }

    // === REPORTING ===

    /// Human-readable diagnostic text
    pub fn status_report<F>(
        &self,
        name: &str,
        hit_points: i32,
        max_hit_points: i32,
        name_of: F,
    ) -> String
    where
        F: Fn(EntityId) -> String,
    {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{name} is {} ({hit_points}/{max_hit_points} hp), {:?}.",
            condition(hit_points, max_hit_points),
            self.state
        );
        match self.target {
            Some(target) => {
                let _ = writeln!(out, "Fighting: {}", name_of(target));
            }
            None => {
                let _ = writeln!(out, "Fighting: nobody");
            }
        }
        let enemies: Vec<String> = self.enemies.iter().map(|e| name_of(e.id)).collect();
        let enemies = if enemies.is_empty() {
            "none".to_string()
        } else {
            enemies.join(", ")
        };
        let _ = writeln!(out, "Enemies: {enemies}");
        let _ = writeln!(out, "Panic: {}", self.panic.level());

        let _ = writeln!(out, "Attacks:");
        for attack in self.attacks.all() {
            let pen = attack.modified_penetration;
            let _ = writeln!(
                out,
                "  {:<12} to-hit {:>3}  pen {}/{}/{}  use {:>3}%",
                attack.label,
                attack.to_hit,
                pen.impale,
                pen.slash,
                pen.bludgeon,
                attack.use_probability
            );
        }

        let _ = writeln!(out, "Hit locations:");
        for location in self.hit_locations.all() {
            let ac = location.modified_armor_class;
            let _ = writeln!(
                out,
                "  {:<12} {:>3}%  ac {}/{}/{}",
                location.description, location.hit_probability, ac.impale, ac.slash, ac.bludgeon
            );
        }
        out
    }
}
