//! Ranged combat entry points
//!
//! Aim, load, fire and unload drive a `RangedEngagement` through its
//! states. Any change between loading and firing that makes the shot
//! impossible cancels it cleanly: the projectile goes back where it came
//! from and nobody is hurt or frightened.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::combat::attack::AttackId;
use crate::combat::messages::{self, Broadcast, Hurt};
use crate::combat::morale::PanicSource;
use crate::combat::ranged::{
    ready_delay, shot_profile, CancelReason, FireOutcome, RangedEngagement, RangedState,
};
use crate::combat::resolution::{roll_critical, to_hit, ToHit};
use crate::combat::weapons::Weapon;
use crate::core::error::{CombatError, Result};
use crate::core::types::{EngagementId, EntityId, ItemId};
use crate::entity::living::{LivingEntity, Stat};
use crate::simulation::arena::{CombatArena, HitRequest};
use crate::simulation::heartbeat::Task;
use crate::world::items::Item;
use crate::world::surroundings::Surroundings;

impl<E: LivingEntity, W: Surroundings> CombatArena<E, W> {
    /// Engagements an archer currently holds
    pub fn engagements_of(&self, archer: EntityId) -> Vec<EngagementId> {
        let mut ids: Vec<EngagementId> = self
            .engagements
            .values()
            .filter(|e| e.archer == archer)
            .map(|e| e.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Aim a wielded launcher at a visible target within range
    pub fn aim(
        &mut self,
        archer: EntityId,
        launcher: ItemId,
        target: EntityId,
    ) -> Result<EngagementId> {
        let a = self
            .entities
            .get(&archer)
            .ok_or(CombatError::EntityNotFound(archer))?;
        if a.is_ghost() {
            return Err(CombatError::InvalidTarget("The dead do not shoot.".into()));
        }
        let archer_room = a.location();

        let launcher_name = self.items.name(launcher);
        let wielded = self
            .sessions
            .get(&archer)
            .is_some_and(|s| s.wielded().contains(&launcher));
        if !wielded {
            return Err(CombatError::NotWielded(launcher_name));
        }
        let range = self
            .items
            .get(launcher)
            .and_then(Item::launcher)
            .map(|l| l.range)
            .ok_or_else(|| CombatError::NotAWeapon(launcher_name.clone()))?;

        if target == archer {
            return Err(CombatError::InvalidTarget("You cannot shoot yourself.".into()));
        }
        let t = self
            .entities
            .get(&target)
            .ok_or(CombatError::EntityNotFound(target))?;
        if t.is_ghost() {
            return Err(CombatError::InvalidTarget(format!("{} is already dead.", t.name())));
        }
        let target_room = t.location();
        let target_name = t.name().to_string();
        match self.world.line_of_sight(archer_room, target_room) {
            Some(distance) if distance <= range => {}
            _ => return Err(CombatError::OutOfRange(target_name)),
        }

        let previous: Vec<EngagementId> = self
            .engagements
            .values()
            .filter(|e| e.archer == archer && e.launcher == launcher)
            .map(|e| e.id)
            .collect();
        for id in previous {
            self.cancel_engagement(id, CancelReason::Unloaded);
        }

        self.next_engagement += 1;
        let id = EngagementId(self.next_engagement);
        self.engagements.insert(
            id,
            RangedEngagement::new(id, archer, launcher, target, archer_room, target_room),
        );

        let archer_name = self.name_of(archer);
        self.broadcast(Broadcast::room(
            archer,
            format!("You aim your {launcher_name} at {target_name}."),
            format!("{archer_name} aims a {launcher_name} at {target_name}."),
        ));
        debug!(%archer, %target, engagement = id.0, "aiming");
        Ok(id)
    }

    /// Load a projectile: a loose one from the inventory first, then a quiver
    pub fn load(&mut self, engagement: EngagementId) -> Result<()> {
        let e = self
            .engagements
            .get(&engagement)
            .ok_or(CombatError::EngagementNotFound(engagement))?;
        if e.is_loaded() {
            return Ok(());
        }
        let archer = e.archer;
        let launcher = self
            .items
            .get(e.launcher)
            .and_then(Item::launcher)
            .cloned()
            .ok_or(CombatError::ItemNotFound(e.launcher))?;

        let a = self
            .entities
            .get(&archer)
            .ok_or(CombatError::EntityNotFound(archer))?;
        let dexterity = a.stat_value(Stat::Dexterity);
        let loose = a.inventory().iter().copied().find(|item| {
            self.items
                .get(*item)
                .and_then(Item::projectile)
                .is_some_and(|p| p.kind == launcher.ammunition)
        });
        let quiver = a.inventory().iter().copied().find(|item| {
            matches!(
                self.items.get(*item),
                Some(Item::Quiver(q)) if q.holds == launcher.ammunition && !q.contents.is_empty()
            )
        });

        let (projectile, source) = match (loose, quiver) {
            (Some(p), _) => {
                if let Some(a) = self.entities.get_mut(&archer) {
                    a.remove_from_inventory(p);
                }
                (p, None)
            }
            (None, Some(q)) => match self.items.get_mut(q) {
                Some(Item::Quiver(quiver)) => match quiver.contents.pop() {
                    Some(p) => (p, Some(q)),
                    None => return Err(CombatError::NoProjectile(launcher.name)),
                },
                _ => return Err(CombatError::NoProjectile(launcher.name)),
            },
            (None, None) => return Err(CombatError::NoProjectile(launcher.name)),
        };

        let delay = ready_delay(&launcher, dexterity, &self.config);
        let now = self.scheduler.now();
        let ready = self
            .scheduler
            .schedule_after(delay, Task::RangedReady(engagement));
        let fatigue = launcher.drawn.then(|| {
            self.scheduler
                .schedule_after(self.config.draw_fatigue_threshold, Task::DrawFatigue(engagement))
        });
        if let Some(e) = self.engagements.get_mut(&engagement) {
            e.projectile = Some(projectile);
            e.source = source;
            e.state = RangedState::Loaded;
            e.loaded_at = Some(now);
            e.ready_timer = Some(ready);
            e.fatigue_timer = fatigue;
        }

        let projectile_name = self.items.name(projectile);
        let archer_name = self.name_of(archer);
        self.broadcast(Broadcast::room(
            archer,
            format!("You load your {} with a {projectile_name}.", launcher.name),
            format!("{archer_name} loads a {}.", launcher.name),
        ));
        debug!(%archer, engagement = engagement.0, delay, "loaded");
        Ok(())
    }

    pub(crate) fn ranged_ready(&mut self, engagement: EngagementId) {
        let Some(e) = self.engagements.get_mut(&engagement) else {
            return;
        };
        e.ready_timer = None;
        if !e.is_loaded() {
            return;
        }
        e.state = RangedState::Ready;
        let (archer, launcher) = (e.archer, e.launcher);
        let name = self.items.name(launcher);
        self.broadcast(Broadcast::private(archer, format!("Your {name} is ready to fire.")));
    }

    /// A bow held drawn too long: the archer tires and lets the draw down
    pub(crate) fn draw_fatigue(&mut self, engagement: EngagementId) {
        let Some(e) = self.engagements.get_mut(&engagement) else {
            return;
        };
        e.fatigue_timer = None;
        if !e.is_loaded() {
            return;
        }
        let archer = e.archer;
        let cost = self.config.draw_fatigue_cost;
        if let Some(a) = self.entities.get_mut(&archer) {
            a.add_fatigue(cost);
        }
        self.cancel_engagement(engagement, CancelReason::DrawFatigue);
    }

    /// Why the shot can no longer be taken, if it cannot
    fn invalid_shot(&self, e: &RangedEngagement) -> Option<CancelReason> {
        let Some(archer) = self.entities.get(&e.archer) else {
            return Some(CancelReason::ArcherDied);
        };
        if archer.is_ghost() {
            return Some(CancelReason::ArcherDied);
        }
        if archer.location() != e.archer_room {
            return Some(CancelReason::ArcherMoved);
        }
        if !self
            .sessions
            .get(&e.archer)
            .is_some_and(|s| s.wielded().contains(&e.launcher))
        {
            return Some(CancelReason::WeaponUnwielded);
        }
        let Some(target) = self.entities.get(&e.target) else {
            return Some(CancelReason::TargetGone);
        };
        if target.is_ghost() {
            return Some(CancelReason::TargetGone);
        }
        if target.location() != e.target_room {
            return Some(CancelReason::TargetMoved);
        }
        None
    }

    /// Loose the projectile at the aimed target
    pub fn fire(&mut self, engagement: EngagementId) -> Result<FireOutcome> {
        let e = self
            .engagements
            .get(&engagement)
            .ok_or(CombatError::EngagementNotFound(engagement))?;
        if e.state != RangedState::Ready {
            return Err(CombatError::NotReady(self.items.name(e.launcher)));
        }
        if let Some(reason) = self.invalid_shot(e) {
            self.cancel_engagement(engagement, reason);
            return Ok(FireOutcome::Cancelled(reason));
        }

        let mut e = self
            .engagements
            .remove(&engagement)
            .ok_or(CombatError::EngagementNotFound(engagement))?;
        for handle in e.take_timers() {
            self.scheduler.cancel(handle);
        }
        let (archer, target) = (e.archer, e.target);
        let projectile_id = e
            .projectile
            .ok_or_else(|| CombatError::NoProjectile(self.items.name(e.launcher)))?;

        let launcher = self.items.get(e.launcher).and_then(Item::launcher).cloned();
        let projectile = self.items.get(projectile_id).and_then(Item::projectile).cloned();
        let (Some(launcher), Some(projectile), Some(exchange)) =
            (launcher, projectile, self.exchange(archer, target))
        else {
            self.return_projectile(&e);
            return Ok(FireOutcome::Cancelled(CancelReason::TargetGone));
        };

        let (weapon_hit, penetration, damage_type) = shot_profile(&launcher, &projectile);
        let skill = self
            .entities
            .get(&archer)
            .map_or(0, |a| a.skill_value(launcher.skill()));
        self.stats.shots += 1;
        self.stats.attacks += 1;

        let roll = to_hit(
            &mut self.rng,
            weapon_hit,
            skill,
            &exchange.attacker,
            &exchange.defender,
        );
        let outcome = match roll {
            ToHit::Miss { magnitude, kind } => {
                self.stats.misses += 1;
                debug!(%archer, %target, magnitude, ?kind, "shot missed");
                self.add_panic_source(archer, PanicSource::Missed);
                self.broadcast(messages::miss(
                    (archer, &exchange.attacker_name),
                    (target, &exchange.defender_name),
                    &projectile.name,
                    kind,
                ));
                FireOutcome::Missed
            }
            ToHit::Hit => {
                self.stats.hits += 1;
                let critical = roll_critical(&mut self.rng, self.config.critical_odds);
                let multiplier = if critical { self.config.critical_multiplier } else { 1 };
                if critical {
                    self.stats.criticals += 1;
                    info!(target: "combat_audit", %archer, %target, "critical shot");
                }
                let request = HitRequest::new(penetration.map(|p| p * multiplier), damage_type)
                    .from_attacker(archer)
                    .with_attack(AttackId::BothHands);
                let result = match self.apply_hit(target, &request) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(%archer, %target, error = %err, "shot could not be resolved");
                        self.return_projectile(&e);
                        return Ok(FireOutcome::Cancelled(CancelReason::TargetGone));
                    }
                };

                self.add_panic_source(archer, PanicSource::HitLanded);
                self.broadcast(messages::hit(
                    (archer, &exchange.attacker_name),
                    (target, &exchange.defender_name),
                    &projectile.name,
                    &result.location_description,
                    Hurt::from_percent(result.hurt_percent),
                    critical,
                ));
                if result.killed {
                    self.finish_kill(target, Some(archer));
                }
                FireOutcome::Hit {
                    damage: result.damage,
                    killed: result.killed,
                }
            }
        };

        if self.is_alive(target) {
            let _ = self.attacked_by(target, archer);
        }

        let broke = matches!(outcome, FireOutcome::Hit { .. })
            && self.rng.gen_range(0..100) < projectile.break_chance;
        if broke {
            self.items.remove(projectile_id);
            debug!(projectile = %projectile_id, "projectile broke");
        } else {
            self.world.drop_item(e.target_room, projectile_id);
        }
        Ok(outcome)
    }

    /// Take the projectile back out and stop aiming
    pub fn unload(&mut self, engagement: EngagementId) -> Result<()> {
        let mut e = self
            .engagements
            .remove(&engagement)
            .ok_or(CombatError::EngagementNotFound(engagement))?;
        for handle in e.take_timers() {
            self.scheduler.cancel(handle);
        }
        self.return_projectile(&e);
        let name = self.items.name(e.launcher);
        self.broadcast(Broadcast::private(e.archer, format!("You unload your {name}.")));
        Ok(())
    }

    /// Put a loaded projectile back in its quiver, the inventory, or on the floor
    fn return_projectile(&mut self, e: &RangedEngagement) {
        let Some(projectile) = e.projectile else {
            return;
        };
        if let Some(Item::Quiver(quiver)) = e.source.and_then(|q| self.items.get_mut(q)) {
            quiver.contents.push(projectile);
            return;
        }
        match self.entities.get_mut(&e.archer) {
            Some(archer) if !archer.is_ghost() => archer.add_to_inventory(projectile),
            _ => self.world.drop_item(e.archer_room, projectile),
        }
    }

    pub(crate) fn cancel_engagement(&mut self, engagement: EngagementId, reason: CancelReason) {
        let Some(mut e) = self.engagements.remove(&engagement) else {
            return;
        };
        for handle in e.take_timers() {
            self.scheduler.cancel(handle);
        }
        self.return_projectile(&e);
        self.stats.cancelled_shots += 1;
        debug!(archer = %e.archer, engagement = engagement.0, ?reason, "engagement cancelled");

        if self.entities.contains_key(&e.archer) {
            let name = self.items.name(e.launcher);
            self.broadcast(Broadcast::private(
                e.archer,
                format!("You lower your {name}: {reason}."),
            ));
        }
    }

    pub(crate) fn cancel_engagements_where<F>(&mut self, predicate: F, reason: CancelReason)
    where
        F: Fn(&RangedEngagement) -> bool,
    {
        let mut ids: Vec<EngagementId> = self
            .engagements
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        for id in ids {
            self.cancel_engagement(id, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::combat::equipment::Loadout;
    use crate::combat::ranged::{FireOutcome, RangedState};
    use crate::core::config::CombatConfig;
    use crate::core::error::CombatError;
    use crate::combat::hit_location::HitLocationTable;
    use crate::core::types::{EntityId, ItemId, RoomId};
    use crate::entity::creature::Creature;
    use crate::entity::living::LivingEntity;
    use crate::simulation::arena::CombatArena;
    use crate::world::items::Item;
    use crate::world::surroundings::RoomGraph;

    fn range() -> CombatArena<Creature, RoomGraph> {
        let mut world = RoomGraph::new();
        world.connect(RoomId(0), "east", RoomId(1));
        world.connect(RoomId(1), "east", RoomId(2));
        world.connect(RoomId(1), "north", RoomId(7));
        CombatArena::new(CombatConfig::default(), world, 3).unwrap()
    }

    fn launcher_of(arena: &CombatArena<Creature, RoomGraph>, archer: EntityId) -> ItemId {
        *arena
            .session(archer)
            .unwrap()
            .wielded()
            .iter()
            .find(|i| matches!(arena.items().get(**i), Some(Item::Launcher(_))))
            .unwrap()
    }

    #[test]
    fn test_aim_requires_sight_and_range() {
        let mut arena = range();
        let archer = arena.register(Creature::humanoid("Ila", 20, RoomId(0)).trained(40));
        arena.equip_loadout(archer, Loadout::Archer).unwrap();
        let bow = launcher_of(&arena, archer);

        let near = arena.register(Creature::humanoid("Near", 20, RoomId(1)));
        let round_corner = arena.register(Creature::humanoid("Hidden", 20, RoomId(7)));

        assert!(arena.aim(archer, bow, near).is_ok());
        assert!(matches!(
            arena.aim(archer, bow, round_corner),
            Err(CombatError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_load_takes_from_quiver_and_becomes_ready() {
        let mut arena = range();
        let archer = arena.register(Creature::humanoid("Ila", 20, RoomId(0)).trained(40));
        arena.equip_loadout(archer, Loadout::Archer).unwrap();
        let bow = launcher_of(&arena, archer);
        let target = arena.register(Creature::humanoid("Bera", 20, RoomId(1)));

        let eng = arena.aim(archer, bow, target).unwrap();
        assert!(matches!(arena.fire(eng), Err(CombatError::NotReady(_))));
        arena.load(eng).unwrap();
        assert_eq!(arena.engagement(eng).unwrap().state, RangedState::Loaded);
        assert!(arena.engagement(eng).unwrap().source.is_some());

        arena.advance(10);
        assert_eq!(arena.engagement(eng).unwrap().state, RangedState::Ready);
    }

    #[test]
    fn test_archer_moving_cancels_and_returns_projectile() {
        let mut arena = range();
        let archer = arena.register(Creature::humanoid("Ila", 20, RoomId(0)).trained(40));
        arena.equip_loadout(archer, Loadout::Archer).unwrap();
        let bow = launcher_of(&arena, archer);
        let target = arena.register(Creature::humanoid("Bera", 20, RoomId(1)));

        let eng = arena.aim(archer, bow, target).unwrap();
        arena.load(eng).unwrap();
        let projectile = arena.engagement(eng).unwrap().projectile.unwrap();
        let quiver = arena.engagement(eng).unwrap().source.unwrap();

        arena.move_entity(archer, RoomId(1)).unwrap();
        assert!(arena.engagement(eng).is_none());
        match arena.items().get(quiver) {
            Some(Item::Quiver(q)) => assert!(q.contents.contains(&projectile)),
            other => panic!("expected quiver, got {other:?}"),
        }
    }

    #[test]
    fn test_held_draw_tires_archer() {
        let mut arena = range();
        let archer = arena.register(Creature::humanoid("Ila", 20, RoomId(0)).trained(40));
        arena.equip_loadout(archer, Loadout::Archer).unwrap();
        let bow = launcher_of(&arena, archer);
        let target = arena.register(Creature::humanoid("Bera", 20, RoomId(1)));

        let eng = arena.aim(archer, bow, target).unwrap();
        arena.load(eng).unwrap();
        let before = arena.entity(archer).unwrap().fatigue();
        let threshold = arena.config().draw_fatigue_threshold;
        arena.advance(threshold + 1);

        assert!(arena.engagement(eng).is_none());
        assert!(arena.entity(archer).unwrap().fatigue() > before);
        assert_eq!(arena.stats().cancelled_shots, 1);
    }

    #[test]
    fn test_fire_resolves_and_provokes_target() {
        let mut arena = range();
        let archer = arena.register(Creature::humanoid("Ila", 20, RoomId(0)).trained(40));
        arena.equip_loadout(archer, Loadout::Archer).unwrap();
        let bow = launcher_of(&arena, archer);
        let target = arena.register(Creature::humanoid("Bera", 20, RoomId(1)));

        let eng = arena.aim(archer, bow, target).unwrap();
        arena.load(eng).unwrap();
        arena.advance(10);
        let outcome = arena.fire(eng).unwrap();

        assert!(matches!(outcome, FireOutcome::Hit { .. } | FireOutcome::Missed));
        assert!(arena.engagement(eng).is_none());
        assert_eq!(arena.stats().shots, 1);
        assert!(arena.query_enemies(target).contains(&archer));
    }

    #[test]
    fn test_unresolvable_shot_returns_projectile() {
        let mut arena = range();
        let archer = arena.register(Creature::humanoid("Ila", 40, RoomId(0)).trained(100));
        arena.equip_loadout(archer, Loadout::Archer).unwrap();
        let bow = launcher_of(&arena, archer);
        let target = arena.register(Creature::humanoid("Dummy", 1, RoomId(1)));

        let eng = arena.aim(archer, bow, target).unwrap();
        arena.load(eng).unwrap();
        let projectile = arena.engagement(eng).unwrap().projectile.unwrap();
        let quiver = arena.engagement(eng).unwrap().source.unwrap();
        arena.advance(10);
        arena.sessions.get_mut(&target).unwrap().hit_locations = HitLocationTable::new();

        let outcome = arena.fire(eng).unwrap();
        assert!(matches!(outcome, FireOutcome::Cancelled(_)));
        assert!(arena.engagement(eng).is_none());
        match arena.items().get(quiver) {
            Some(Item::Quiver(q)) => assert!(q.contents.contains(&projectile)),
            other => panic!("expected quiver, got {other:?}"),
        }
        let dummy = arena.entity(target).unwrap();
        assert_eq!(dummy.hit_points(), dummy.max_hit_points());
    }
}
