//! Combat arena: the public face of the combat core
//!
//! The arena owns the entities, their sessions, the item store, ranged
//! engagements, the scheduler and the seeded RNG. Every cross-entity
//! effect goes through one of its entry points; sessions never call into
//! each other.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::combat::attack::{Attack, AttackId};
use crate::combat::constants::TOTAL_HIT_PROBABILITY;
use crate::combat::damage::{DamageType, Penetration};
use crate::combat::equipment::Loadout;
use crate::combat::hit_location::{HitLocationTable, LocationId};
use crate::combat::messages::{Broadcast, Delivery};
use crate::combat::morale::PanicSource;
use crate::combat::ranged::{CancelReason, RangedEngagement};
use crate::combat::resolution::{hurt_percent, pick_hit_location, resolve_hit};
use crate::combat::session::{CombatSession, SessionState, WieldSkills};
use crate::combat::weapons::Quiver;
use crate::core::config::CombatConfig;
use crate::core::error::{CombatError, Result};
use crate::core::types::{EngagementId, EntityId, ItemId, RoomId, Tick};
use crate::entity::living::{LivingEntity, Skill, Stat};
use crate::simulation::heartbeat::{HeartbeatScheduler, Task};
use crate::world::items::{Item, ItemStore};
use crate::world::surroundings::Surroundings;

/// A blow delivered to `hit_me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRequest {
    pub attacker: Option<EntityId>,
    pub penetration: Penetration,
    pub damage_type: DamageType,
    pub attack: Option<AttackId>,
    /// Aimed location; rolled when None
    pub location: Option<LocationId>,
}

impl HitRequest {
    pub fn new(penetration: Penetration, damage_type: DamageType) -> Self {
        Self {
            attacker: None,
            penetration,
            damage_type,
            attack: None,
            location: None,
        }
    }

    pub fn from_attacker(mut self, attacker: EntityId) -> Self {
        self.attacker = Some(attacker);
        self
    }

    pub fn with_attack(mut self, attack: AttackId) -> Self {
        self.attack = Some(attack);
        self
    }

    pub fn at(mut self, location: LocationId) -> Self {
        self.location = Some(location);
        self
    }
}

/// What `hit_me` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitResult {
    /// Damage as a share of the hit points the defender had
    pub hurt_percent: i32,
    pub location_description: String,
    /// Location roll in 1..=100, 0 when the location was aimed
    pub hit_roll: i32,
    pub damage: i32,
    pub location: LocationId,
    pub killed: bool,
}

/// Running totals, mostly for the duel runner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    pub rounds: u64,
    pub attacks: u64,
    pub hits: u64,
    pub misses: u64,
    pub damage: i64,
    pub criticals: u64,
    pub kills: u64,
    pub flees: u64,
    pub shots: u64,
    pub cancelled_shots: u64,
}

impl CombatStats {
    pub fn hit_rate(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            self.hits as f64 / self.attacks as f64
        }
    }
}

pub(crate) fn wield_skills<E: LivingEntity>(entity: &E, weapon: Option<Skill>) -> WieldSkills {
    WieldSkills {
        weapon: weapon.map(|s| entity.skill_value(s)).unwrap_or(0),
        two_handed: entity.skill_value(Skill::TwoHandedCombat),
        unarmed: entity.skill_value(Skill::UnarmedCombat),
        strength: entity.stat_value(Stat::Strength),
    }
}

pub struct CombatArena<E: LivingEntity, W: Surroundings> {
    pub(crate) config: CombatConfig,
    pub(crate) world: W,
    pub(crate) items: ItemStore,
    pub(crate) entities: AHashMap<EntityId, E>,
    /// Registration order, for deterministic iteration
    pub(crate) order: Vec<EntityId>,
    pub(crate) sessions: AHashMap<EntityId, CombatSession>,
    pub(crate) engagements: AHashMap<EngagementId, RangedEngagement>,
    pub(crate) next_engagement: u32,
    pub(crate) scheduler: HeartbeatScheduler,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) outbox: Vec<Delivery>,
    pub(crate) stats: CombatStats,
}

impl<E: LivingEntity, W: Surroundings> CombatArena<E, W> {
    pub fn new(config: CombatConfig, world: W, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            world,
            items: ItemStore::new(),
            entities: AHashMap::new(),
            order: Vec::new(),
            sessions: AHashMap::new(),
            engagements: AHashMap::new(),
            next_engagement: 0,
            scheduler: HeartbeatScheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            outbox: Vec::new(),
            stats: CombatStats::default(),
        })
    }

    // === ACCESSORS ===

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut ItemStore {
        &mut self.items
    }

    pub fn entity(&self, id: EntityId) -> Option<&E> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut E> {
        self.entities.get_mut(&id)
    }

    pub fn session(&self, id: EntityId) -> Option<&CombatSession> {
        self.sessions.get(&id)
    }

    pub fn engagement(&self, id: EngagementId) -> Option<&RangedEngagement> {
        self.engagements.get(&id)
    }

    pub fn now(&self) -> Tick {
        self.scheduler.now()
    }

    pub fn stats(&self) -> &CombatStats {
        &self.stats
    }

    /// Take every queued message, in delivery order
    pub fn drain_messages(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| !e.is_ghost())
    }

    pub(crate) fn name_of(&self, id: EntityId) -> String {
        self.entities
            .get(&id)
            .map(|e| e.name().to_string())
            .unwrap_or_else(|| "someone".to_string())
    }

    // === REGISTRATION ===

    /// Add an entity and configure its combat session
    pub fn register(&mut self, entity: E) -> EntityId {
        let id = entity.id();
        if self.entities.insert(id, entity).is_none() {
            self.order.push(id);
        }
        // Cannot fail: the entity was just inserted
        let _ = self.ensure_session(id);
        id
    }

    /// Remove an entity, ending every fight and engagement it is part of
    pub fn remove_entity(&mut self, id: EntityId) -> Option<E> {
        if let Some(mut session) = self.sessions.remove(&id) {
            for handle in session.heartbeat.take().into_iter().chain(session.teardown.take()) {
                self.scheduler.cancel(handle);
            }
        }
        for session in self.sessions.values_mut() {
            session.remove_enemy(id);
        }
        self.cancel_engagements_where(|e| e.archer == id, CancelReason::ArcherDied);
        self.cancel_engagements_where(|e| e.target == id, CancelReason::TargetGone);
        self.order.retain(|o| *o != id);
        self.entities.remove(&id)
    }

    /// Move an entity; an archer that moves loses its aim
    pub fn move_entity(&mut self, id: EntityId, room: RoomId) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(CombatError::EntityNotFound(id))?;
        entity.set_location(room);
        self.cancel_engagements_where(
            |e| e.archer == id && e.archer_room != room,
            CancelReason::ArcherMoved,
        );
        Ok(())
    }

    fn build_session(entity: &E, config: &CombatConfig) -> CombatSession {
        let skills = wield_skills(entity, None);
        if entity.is_humanoid() {
            return CombatSession::humanoid(entity.id(), skills, config);
        }

        let mut session = CombatSession::new(entity.id());
        session.hit_locations = HitLocationTable::humanoid(0);
        let pen = config.unarmed_pen_base + skills.unarmed / 5;
        let bite = Attack::new(
            AttackId::Natural(0),
            config.unarmed_hit_base + skills.unarmed / 2,
            Penetration::new(pen, 0, pen),
            DamageType::IMPALE | DamageType::BLUDGEON,
            100,
        )
        .with_skill(skills.unarmed)
        .with_label("bite");
        let _ = session.attacks.add_attack(bite, skills.strength);
        session
    }

    /// Enforce the 100 % hit probability invariant at configuration time
    fn check_locations(session: &mut CombatSession) {
        if session.hit_locations.is_empty() {
            tracing::warn!(
                owner = %session.owner,
                "no hit locations configured, using humanoid body"
            );
            session.hit_locations = HitLocationTable::humanoid(0);
        }
        if let Err(total) = session.hit_locations.validate() {
            tracing::warn!(
                owner = %session.owner,
                total,
                "hit probabilities do not sum to {}, normalising",
                TOTAL_HIT_PROBABILITY
            );
            session.hit_locations.normalize();
        }
    }

    pub(crate) fn ensure_session(&mut self, id: EntityId) -> Result<&mut CombatSession> {
        if !self.sessions.contains_key(&id) {
            let entity = self
                .entities
                .get(&id)
                .ok_or(CombatError::EntityNotFound(id))?;
            let mut session = Self::build_session(entity, &self.config);
            Self::check_locations(&mut session);
            tracing::debug!(entity = %id, "combat session created");
            self.sessions.insert(id, session);
        }
        self.sessions
            .get_mut(&id)
            .ok_or(CombatError::SessionNotFound(id))
    }

    /// Reconfigure a session's tables, then re-check them
    pub fn configure_session<F>(&mut self, id: EntityId, configure: F) -> Result<()>
    where
        F: FnOnce(&mut CombatSession),
    {
        let session = self.ensure_session(id)?;
        configure(session);
        session.configured = true;
        Self::check_locations(session);
        self.redistribute(id);
        Ok(())
    }

    pub(crate) fn redistribute(&mut self, id: EntityId) {
        let humanoid = self.entities.get(&id).is_some_and(|e| e.is_humanoid());
        if !humanoid {
            return;
        }
        let items = &self.items;
        if let Some(session) = self.sessions.get_mut(&id) {
            session.redistribute(self.config.humanoid_attack_budget, |item| {
                items.blocks_attack(item)
            });
        }
    }

    // === ITEMS AND EQUIPMENT ===

    /// Put a new item into an entity's inventory
    pub fn give(&mut self, entity: EntityId, item: Item) -> Result<ItemId> {
        if !self.entities.contains_key(&entity) {
            return Err(CombatError::EntityNotFound(entity));
        }
        let id = self.items.insert(item);
        if let Some(e) = self.entities.get_mut(&entity) {
            e.add_to_inventory(id);
        }
        Ok(id)
    }

    /// Hand out and equip a standard kit
    pub fn equip_loadout(&mut self, entity: EntityId, loadout: Loadout) -> Result<()> {
        let kit = loadout.kit();
        for weapon in kit.weapons {
            let id = self.give(entity, Item::Melee(weapon))?;
            self.wield_weapon(entity, id)?;
        }
        for piece in kit.armor {
            let id = self.give(entity, Item::Armor(piece))?;
            self.wear_armor(entity, id)?;
        }
        if let Some(launcher) = kit.launcher {
            let kind = launcher.ammunition;
            let id = self.give(entity, Item::Launcher(launcher))?;
            self.wield_weapon(entity, id)?;
            if !kit.projectiles.is_empty() {
                let mut quiver = Quiver::new(kind);
                for projectile in kit.projectiles {
                    quiver.contents.push(self.items.insert(Item::Projectile(projectile)));
                }
                self.give(entity, Item::Quiver(quiver))?;
            }
        }
        Ok(())
    }

    fn slot_error(&self, item: ItemId, blocker: ItemId) -> CombatError {
        CombatError::SlotOccupied {
            item: self.items.name(item),
            blocker: self.items.name(blocker),
        }
    }

    fn carried_item(&self, entity: EntityId, item: ItemId) -> Result<&Item> {
        let e = self
            .entities
            .get(&entity)
            .ok_or(CombatError::EntityNotFound(entity))?;
        if !e.inventory().contains(&item) {
            return Err(CombatError::ItemNotFound(item));
        }
        self.items.get(item).ok_or(CombatError::ItemNotFound(item))
    }

    /// Wield a carried weapon; its attack replaces the bare hand it occupies
    pub fn wield_weapon(&mut self, entity: EntityId, item: ItemId) -> Result<AttackId> {
        self.ensure_session(entity)?;
        let stored = self.carried_item(entity, item)?.clone();
        let weapon = stored
            .weapon()
            .ok_or_else(|| CombatError::NotAWeapon(stored.name().to_string()))?;

        let result = {
            let e = self
                .entities
                .get(&entity)
                .ok_or(CombatError::EntityNotFound(entity))?;
            let skills = wield_skills(e, Some(weapon.skill()));
            let session = self
                .sessions
                .get_mut(&entity)
                .ok_or(CombatError::SessionNotFound(entity))?;
            session.wield(item, weapon, skills, &self.config)
        };

        match result {
            Ok(attack) => {
                tracing::debug!(%entity, %item, %attack, "weapon wielded");
                self.redistribute(entity);
                Ok(attack)
            }
            Err(conflict) => Err(self.slot_error(item, conflict.blocker)),
        }
    }

    /// Stop wielding a weapon; bare hands return and any aim with it is dropped
    pub fn unwield_weapon(&mut self, entity: EntityId, item: ItemId) -> Result<()> {
        let e = self
            .entities
            .get(&entity)
            .ok_or(CombatError::EntityNotFound(entity))?;
        let skills = wield_skills(e, None);
        let unwielded = self
            .sessions
            .get_mut(&entity)
            .is_some_and(|s| s.unwield(item, skills, &self.config));
        if !unwielded {
            return Err(CombatError::NotWielded(self.items.name(item)));
        }

        self.cancel_engagements_where(
            |e| e.archer == entity && e.launcher == item,
            CancelReason::WeaponUnwielded,
        );
        self.redistribute(entity);
        tracing::debug!(%entity, %item, "weapon unwielded");
        Ok(())
    }

    /// Wear carried armour, adding its class to the locations it covers
    pub fn wear_armor(&mut self, entity: EntityId, item: ItemId) -> Result<Vec<LocationId>> {
        self.ensure_session(entity)?;
        let stored = self.carried_item(entity, item)?.clone();
        let armor = stored
            .armor()
            .ok_or_else(|| CombatError::NotArmor(stored.name().to_string()))?;
        let result = self
            .sessions
            .get_mut(&entity)
            .ok_or(CombatError::SessionNotFound(entity))?
            .wear(item, armor);

        match result {
            Ok(covered) => {
                tracing::debug!(%entity, %item, ?covered, "armour worn");
                self.redistribute(entity);
                Ok(covered)
            }
            Err(conflict) => Err(self.slot_error(item, conflict.blocker)),
        }
    }

    pub fn remove_armor(&mut self, entity: EntityId, item: ItemId) -> Result<()> {
        let removed = self
            .sessions
            .get_mut(&entity)
            .is_some_and(|s| s.remove_armor(item));
        if !removed {
            return Err(CombatError::NotWorn(self.items.name(item)));
        }
        self.redistribute(entity);
        Ok(())
    }

    /// Re-read a wielded weapon's properties
    pub fn update_weapon(&mut self, entity: EntityId, item: ItemId) -> Result<()> {
        let stored = self.items.get(item).ok_or(CombatError::ItemNotFound(item))?;
        let weapon = stored
            .weapon()
            .ok_or_else(|| CombatError::NotAWeapon(stored.name().to_string()))?;
        let e = self
            .entities
            .get(&entity)
            .ok_or(CombatError::EntityNotFound(entity))?;
        let skills = wield_skills(e, Some(weapon.skill()));
        let updated = self
            .sessions
            .get_mut(&entity)
            .is_some_and(|s| s.update_weapon(item, weapon, skills, &self.config));
        if !updated {
            return Err(CombatError::NotWielded(self.items.name(item)));
        }
        self.redistribute(entity);
        Ok(())
    }

    /// Re-read a worn piece's armour class
    pub fn update_armor(&mut self, entity: EntityId, item: ItemId) -> Result<()> {
        let stored = self.items.get(item).ok_or(CombatError::ItemNotFound(item))?;
        let armor = stored
            .armor()
            .ok_or_else(|| CombatError::NotArmor(stored.name().to_string()))?;
        let updated = self
            .sessions
            .get_mut(&entity)
            .is_some_and(|s| s.update_armor(item, armor));
        if !updated {
            return Err(CombatError::NotWorn(self.items.name(item)));
        }
        Ok(())
    }

    // === FIGHTING ===

    /// Start fighting `target`; a forced target jumps to the front of the enemy list
    pub fn attack(&mut self, attacker: EntityId, target: EntityId, forced: bool) -> Result<()> {
        if attacker == target {
            return Err(CombatError::InvalidTarget("You cannot attack yourself.".into()));
        }
        let a = self
            .entities
            .get(&attacker)
            .ok_or(CombatError::EntityNotFound(attacker))?;
        if a.is_ghost() {
            return Err(CombatError::InvalidTarget("The dead do not fight.".into()));
        }
        let t = self
            .entities
            .get(&target)
            .ok_or(CombatError::EntityNotFound(target))?;
        if t.is_ghost() {
            return Err(CombatError::InvalidTarget(format!("{} is already dead.", t.name())));
        }

        let cap = self.config.enemy_cap;
        self.ensure_session(attacker)?.attack(target, forced, cap);
        tracing::debug!(%attacker, %target, forced, "attack");
        self.start_heartbeat(attacker);
        self.attacked_by(target, attacker)
    }

    /// `defender` learns it is under attack
    ///
    /// It only switches target when its current one is scripted and the new
    /// attacker is not.
    pub fn attacked_by(&mut self, defender: EntityId, attacker: EntityId) -> Result<()> {
        if !self.entities.contains_key(&attacker) {
            return Err(CombatError::EntityNotFound(attacker));
        }
        self.ensure_session(defender)?;

        let current = self.sessions.get(&defender).and_then(|s| s.target());
        let attacker_interactive = self
            .entities
            .get(&attacker)
            .is_some_and(|e| e.is_interactive());
        let prefer = match current {
            Some(t) if t != attacker => {
                attacker_interactive
                    && !self.entities.get(&t).is_some_and(|e| e.is_interactive())
            }
            _ => false,
        };

        let cap = self.config.enemy_cap;
        if let Some(session) = self.sessions.get_mut(&defender) {
            session.attacked_by(attacker, prefer, cap);
        }
        self.start_heartbeat(defender);
        Ok(())
    }

    /// Apply a blow to `defender`: location, armour, damage, death
    pub fn hit_me(&mut self, defender: EntityId, request: HitRequest) -> Result<HitResult> {
        let result = self.apply_hit(defender, &request)?;
        if result.killed {
            self.finish_kill(defender, request.attacker);
        }
        Ok(result)
    }

    /// Everything of `hit_me` except death handling
    pub(crate) fn apply_hit(
        &mut self,
        defender: EntityId,
        request: &HitRequest,
    ) -> Result<HitResult> {
        let now = self.scheduler.now();
        self.ensure_session(defender)?;
        let session = self
            .sessions
            .get(&defender)
            .ok_or(CombatError::SessionNotFound(defender))?;

        let (location_id, hit_roll) = match request.location {
            Some(id) if session.hit_locations.query(id).is_some() => (id, 0),
            _ => {
                let roll = self.rng.gen_range(1..=TOTAL_HIT_PROBABILITY);
                let id = pick_hit_location(&session.hit_locations, roll).ok_or_else(|| {
                    CombatError::InvalidTarget(format!("{defender} has no hit locations"))
                })?;
                (id, roll)
            }
        };
        let location = session.hit_locations.query(location_id).ok_or_else(|| {
            CombatError::InvalidTarget(format!("{defender} has no {location_id:?}"))
        })?;
        let blow = resolve_hit(&mut self.rng, request.penetration, request.damage_type, location);
        let location_description = location.description.clone();

        let entity = self
            .entities
            .get_mut(&defender)
            .ok_or(CombatError::EntityNotFound(defender))?;
        let before = entity.hit_points();
        let mut damage = blow.damage;
        if entity.is_wizard() {
            damage = damage.min((before - 1).max(0));
        }
        entity.reduce_hit_points(damage);
        let killed = !entity.is_wizard() && !entity.is_ghost() && entity.hit_points() <= 0;

        if let Some(session) = self.sessions.get_mut(&defender) {
            session.panic.apply(PanicSource::BlowReceived, &self.config);
            session.last_exchange = now;
        }
        if let Some(attacker) = request.attacker.and_then(|a| self.entities.get_mut(&a)) {
            attacker.grant_combat_reward(defender, damage, false);
        }
        self.stats.damage += i64::from(damage);

        tracing::debug!(
            %defender,
            location = ?location_id,
            hit_roll,
            column = ?blow.column,
            damage,
            killed,
            "blow resolved"
        );

        Ok(HitResult {
            hurt_percent: hurt_percent(damage, before),
            location_description,
            hit_roll,
            damage,
            location: location_id,
            killed,
        })
    }

    /// Forget `targets`; pick a new target among remaining enemies in reach
    pub fn stop_fighting(&mut self, entity: EntityId, targets: &[EntityId]) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&entity)
            .ok_or(CombatError::SessionNotFound(entity))?;
        let lost_target = session.stop_fighting(targets);
        tracing::debug!(%entity, count = targets.len(), lost_target, "stop fighting");
        if lost_target {
            self.refresh_target(entity);
        }
        Ok(())
    }

    // === QUERIES ===

    pub fn query_attack(&self, entity: EntityId, attack: AttackId) -> Option<&Attack> {
        self.sessions.get(&entity)?.attacks.query(attack)
    }

    /// Every attack of an entity, in round order
    pub fn attacks(&self, entity: EntityId) -> &[Attack] {
        self.sessions
            .get(&entity)
            .map(|s| s.attacks.all())
            .unwrap_or(&[])
    }

    pub fn query_enemies(&self, entity: EntityId) -> Vec<EntityId> {
        self.sessions
            .get(&entity)
            .map(CombatSession::enemies)
            .unwrap_or_default()
    }

    pub fn current_target(&self, entity: EntityId) -> Option<EntityId> {
        self.sessions.get(&entity)?.target()
    }

    pub fn session_state(&self, entity: EntityId) -> SessionState {
        self.sessions
            .get(&entity)
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    /// Adjust panic; returns the new level, never below zero
    pub fn add_panic(&mut self, entity: EntityId, delta: i32) -> Result<i32> {
        Ok(self.ensure_session(entity)?.panic.add(delta))
    }

    pub fn panic_level(&self, entity: EntityId) -> i32 {
        self.sessions
            .get(&entity)
            .map(|s| s.panic.level())
            .unwrap_or(0)
    }

    pub fn status_report(&self, entity: EntityId) -> Result<String> {
        let e = self
            .entities
            .get(&entity)
            .ok_or(CombatError::EntityNotFound(entity))?;
        let session = self
            .sessions
            .get(&entity)
            .ok_or(CombatError::SessionNotFound(entity))?;
        Ok(session.status_report(e.name(), e.hit_points(), e.max_hit_points(), |id| {
            self.name_of(id)
        }))
    }

    // === SCHEDULING ===

    pub(crate) fn start_heartbeat(&mut self, id: EntityId) {
        let now = self.scheduler.now();
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if let Some(handle) = session.teardown.take() {
            self.scheduler.cancel(handle);
        }
        if session.state == SessionState::Idle {
            session.state = SessionState::Engaged;
            session.last_exchange = now;
        }
        if session.heartbeat.is_none() {
            session.heartbeat = Some(self.scheduler.schedule_after(0, Task::Round(id)));
        }
    }

    pub(crate) fn schedule_round(&mut self, id: EntityId) {
        let interval = self.config.round_interval;
        if let Some(session) = self.sessions.get_mut(&id) {
            if session.heartbeat.is_none() {
                session.heartbeat = Some(self.scheduler.schedule_after(interval, Task::Round(id)));
            }
        }
    }

    pub(crate) fn schedule_teardown(&mut self, id: EntityId) {
        let delay = self.config.teardown_delay;
        if let Some(session) = self.sessions.get_mut(&id) {
            if session.teardown.is_none() {
                session.teardown = Some(self.scheduler.schedule_after(delay, Task::Teardown(id)));
            }
        }
    }

    /// Run every task due within the next `ticks` ticks; returns tasks run
    pub fn advance(&mut self, ticks: Tick) -> usize {
        let until = self.scheduler.now().saturating_add(ticks);
        let mut ran = 0;
        loop {
            while let Some(task) = self.scheduler.pop_due() {
                self.run_task(task);
                ran += 1;
            }
            if self.scheduler.now() >= until {
                break;
            }
            self.scheduler.tick();
        }
        ran
    }

    /// Run until no task is pending or `max_ticks` pass; returns ticks elapsed
    pub fn run_until_idle(&mut self, max_ticks: Tick) -> Tick {
        let start = self.scheduler.now();
        let limit = start.saturating_add(max_ticks);
        loop {
            while let Some(task) = self.scheduler.pop_due() {
                self.run_task(task);
            }
            match self.scheduler.next_due() {
                Some(due) if due <= limit => self.scheduler.jump_to(due),
                _ => break,
            }
        }
        self.scheduler.now() - start
    }

    pub(crate) fn run_task(&mut self, task: Task) {
        match task {
            Task::Round(id) => self.run_round(id),
            Task::Teardown(id) => self.teardown(id),
            Task::FleeRecovery(id) => self.recover_from_flee(id),
            Task::RangedReady(id) => self.ranged_ready(id),
            Task::DrawFatigue(id) => self.draw_fatigue(id),
        }
    }

    // === MESSAGES ===

    /// Queue a broadcast for the actor, everyone else in the actor's room, then the target
    pub(crate) fn broadcast(&mut self, message: Broadcast) {
        let room = self.entities.get(&message.actor).map(|e| e.location());
        let bystanders: Vec<EntityId> = match room {
            Some(room) => self
                .order
                .iter()
                .copied()
                .filter(|id| self.entities.get(id).is_some_and(|e| e.location() == room))
                .collect(),
            None => Vec::new(),
        };
        self.outbox.extend(message.deliver(bystanders));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::creature::Creature;
    use crate::world::surroundings::RoomGraph;

    fn arena() -> CombatArena<Creature, RoomGraph> {
        CombatArena::new(CombatConfig::default(), RoomGraph::new(), 7).unwrap()
    }

    fn fighter(name: &str) -> Creature {
        Creature::humanoid(name, 20, RoomId(0)).trained(30)
    }

    #[test]
    fn test_register_creates_valid_session() {
        let mut arena = arena();
        let id = arena.register(fighter("Aldo"));
        let session = arena.session(id).unwrap();
        assert_eq!(session.hit_locations.validate(), Ok(()));
        assert_eq!(arena.attacks(id).len(), 4);
    }

    #[test]
    fn test_configure_session_normalises_bad_table() {
        let mut arena = arena();
        let id = arena.register(Creature::beast("wolf", 15, RoomId(0)));
        arena
            .configure_session(id, |s| {
                s.hit_locations.remove_hit_location(LocationId::Legs);
            })
            .unwrap();
        assert_eq!(arena.session(id).unwrap().hit_locations.validate(), Ok(()));
        assert!(arena.query_attack(id, AttackId::Natural(0)).is_some());
    }

    #[test]
    fn test_attack_makes_both_sides_enemies() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        let b = arena.register(fighter("Bera"));
        arena.attack(a, b, false).unwrap();
        assert_eq!(arena.query_enemies(a), vec![b]);
        assert_eq!(arena.query_enemies(b), vec![a]);
        assert_eq!(arena.current_target(b), Some(a));
    }

    #[test]
    fn test_attack_self_is_rejected() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        assert!(matches!(arena.attack(a, a, false), Err(CombatError::InvalidTarget(_))));
    }

    #[test]
    fn test_attacked_by_prefers_player_over_scripted() {
        let mut arena = arena();
        let hero = arena.register(fighter("Hero").interactive());
        let rat = arena.register(fighter("Rat"));
        let guard = arena.register(fighter("Guard"));

        arena.attacked_by(guard, rat).unwrap();
        arena.attacked_by(guard, hero).unwrap();
        assert_eq!(arena.current_target(guard), Some(hero));

        let other = arena.register(fighter("Other"));
        arena.attacked_by(guard, other).unwrap();
        assert_eq!(arena.current_target(guard), Some(hero));
    }

    #[test]
    fn test_hit_me_aimed_location() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        let request =
            HitRequest::new(Penetration::uniform(0), DamageType::SLASH).at(LocationId::Head);
        let result = arena.hit_me(a, request).unwrap();
        assert_eq!(result.location, LocationId::Head);
        assert_eq!(result.hit_roll, 0);
        assert_eq!(result.damage, 0);
        assert_eq!(result.location_description, "head");
    }

    #[test]
    fn test_wield_conflict_names_blocker() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        let shield = arena
            .give(a, Item::Armor(crate::combat::armor::ArmorPiece::shield()))
            .unwrap();
        arena.wear_armor(a, shield).unwrap();
        let halberd = arena
            .give(a, Item::Melee(crate::combat::weapons::MeleeWeapon::halberd()))
            .unwrap();
        let err = arena.wield_weapon(a, halberd).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You cannot use the halberd while wielding or wearing the shield."
        );
    }

    #[test]
    fn test_wield_requires_carrying() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        let b = arena.register(fighter("Bera"));
        let sword = arena
            .give(b, Item::Melee(crate::combat::weapons::MeleeWeapon::sword()))
            .unwrap();
        assert!(matches!(arena.wield_weapon(a, sword), Err(CombatError::ItemNotFound(_))));
    }

    #[test]
    fn test_status_report_names_target() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        let b = arena.register(fighter("Bera"));
        arena.attack(a, b, false).unwrap();
        let report = arena.status_report(a).unwrap();
        assert!(report.contains("Fighting: Bera"));
    }

    #[test]
    fn test_add_panic_floors_at_zero() {
        let mut arena = arena();
        let a = arena.register(fighter("Aldo"));
        assert_eq!(arena.add_panic(a, 5).unwrap(), 5);
        assert_eq!(arena.add_panic(a, -20).unwrap(), 0);
    }
}
