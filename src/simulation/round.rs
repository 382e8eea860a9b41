//! One combat round per heartbeat
//!
//! A round refreshes the target, runs each attack that passes its use roll,
//! then checks morale. Kills, flight and session teardown also live here.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::combat::attack::Attack;
use crate::combat::messages::{self, Broadcast, Hurt};
use crate::combat::morale::{BreakResult, PanicSource};
use crate::combat::ranged::CancelReason;
use crate::combat::resolution::{roll_critical, to_hit, CombatantView, ToHit};
use crate::combat::session::SessionState;
use crate::core::types::{EntityId, Tick};
use crate::entity::living::{LivingEntity, Stat};
use crate::simulation::arena::{CombatArena, HitRequest};
use crate::simulation::heartbeat::Task;
use crate::world::surroundings::Surroundings;

/// Both sides of an exchange, with names for the messages
pub(crate) struct Exchange {
    pub attacker: CombatantView,
    pub defender: CombatantView,
    pub attacker_name: String,
    pub defender_name: String,
}

impl<E: LivingEntity, W: Surroundings> CombatArena<E, W> {
    /// Snapshot attacker and defender for the to-hit roll
    pub(crate) fn exchange(&self, attacker: EntityId, defender: EntityId) -> Option<Exchange> {
        let a = self.entities.get(&attacker)?;
        let d = self.entities.get(&defender)?;
        let dark = self.world.is_dark(a.location());
        let armed = |id: EntityId| self.sessions.get(&id).is_some_and(|s| s.is_armed());

        Some(Exchange {
            attacker: CombatantView::of(
                a,
                armed(attacker),
                a.can_see_in_room() && !dark && !d.is_invisible(),
            ),
            defender: CombatantView::of(
                d,
                armed(defender),
                d.can_see_in_room() && !dark && !a.is_invisible(),
            ),
            attacker_name: a.name().to_string(),
            defender_name: d.name().to_string(),
        })
    }

    pub(crate) fn add_panic_source(&mut self, id: EntityId, source: PanicSource) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.panic.apply(source, &self.config);
        }
    }

    /// Keep the target if it is still here, else pick the oldest enemy in reach
    ///
    /// Enemies that are gone or dead are forgotten.
    pub(crate) fn refresh_target(&mut self, id: EntityId) -> Option<EntityId> {
        let room = self.entities.get(&id)?.location();
        let session = self.sessions.get(&id)?;

        let gone: Vec<EntityId> = session
            .enemies()
            .into_iter()
            .filter(|e| !self.is_alive(*e))
            .collect();
        let present = |e: &EntityId| {
            self.entities
                .get(e)
                .is_some_and(|x| !x.is_ghost() && x.location() == room)
        };
        let next = session
            .target()
            .filter(|t| present(t))
            .or_else(|| session.enemies().into_iter().find(|e| present(e)));

        let session = self.sessions.get_mut(&id)?;
        for enemy in gone {
            session.remove_enemy(enemy);
        }
        session.set_target(next);
        session.state = if next.is_some() {
            SessionState::Engaged
        } else if session.has_enemies() {
            SessionState::Hunting
        } else {
            SessionState::Idle
        };
        next
    }

    // === ROUND ===

    pub(crate) fn run_round(&mut self, id: EntityId) {
        let now = self.scheduler.now();
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        session.heartbeat = None;

        if !self.is_alive(id) {
            self.wind_down(id);
            return;
        }

        let Some(target) = self.refresh_target(id) else {
            self.hunt(id, now);
            return;
        };
        if let Some(session) = self.sessions.get_mut(&id) {
            session.last_exchange = now;
        }

        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        if entity.is_stunned() || entity.is_fumbling() {
            debug!(entity = %id, "round skipped, incapacitated");
            self.schedule_round(id);
            return;
        }
        let delay = entity.attack_delay();
        if delay > 0 {
            entity.set_attack_delay(delay - 1);
            self.schedule_round(id);
            return;
        }
        if entity.special_attack(target) {
            debug!(entity = %id, %target, "special attack replaced the round");
            self.schedule_round(id);
            return;
        }

        let attacks: Vec<Attack> = self
            .sessions
            .get_mut(&id)
            .map(|s| {
                s.rounds += 1;
                s.attacks.all().to_vec()
            })
            .unwrap_or_default();
        self.stats.rounds += 1;

        for attack in &attacks {
            if !self.is_alive(target) || !self.is_alive(id) {
                break;
            }
            if self.rng.gen_range(0..100) >= attack.use_probability {
                continue;
            }
            if self
                .entities
                .get(&id)
                .is_some_and(|e| e.veto_attack(target, attack.id))
            {
                continue;
            }
            self.strike(id, target, attack);
        }

        let fatigue = self.config.fatigue_per_round;
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.add_fatigue(fatigue);
        }

        if self.is_alive(id) && self.should_flee(id) {
            self.flee(id);
            return;
        }
        self.schedule_round(id);
    }

    /// No target in reach: keep hunting until the grace period runs out
    fn hunt(&mut self, id: EntityId, now: Tick) {
        let grace = self.config.grace_period;
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        session.panic.decay(&self.config);

        if !session.has_enemies() || now.saturating_sub(session.last_exchange) >= grace {
            session.clear_enemies();
            session.state = SessionState::Idle;
            debug!(entity = %id, "combat over");
            self.schedule_teardown(id);
        } else {
            self.schedule_round(id);
        }
    }

    /// One attack against one defender
    pub(crate) fn strike(&mut self, attacker: EntityId, defender: EntityId, attack: &Attack) {
        let Some(exchange) = self.exchange(attacker, defender) else {
            return;
        };
        self.stats.attacks += 1;

        let roll = to_hit(
            &mut self.rng,
            attack.to_hit,
            attack.skill,
            &exchange.attacker,
            &exchange.defender,
        );
        match roll {
            ToHit::Miss { magnitude, kind } => {
                self.stats.misses += 1;
                debug!(%attacker, %defender, attack = %attack.id, magnitude, ?kind, "miss");
                self.add_panic_source(attacker, PanicSource::Missed);
                self.broadcast(messages::miss(
                    (attacker, &exchange.attacker_name),
                    (defender, &exchange.defender_name),
                    &attack.label,
                    kind,
                ));
            }
            ToHit::Hit => {
                self.stats.hits += 1;
                let critical = roll_critical(&mut self.rng, self.config.critical_odds);
                let mut penetration = attack.modified_penetration;
                if critical {
                    let multiplier = self.config.critical_multiplier;
                    penetration = penetration.map(|p| p * multiplier);
                    self.stats.criticals += 1;
                    info!(
                        target: "combat_audit",
                        %attacker,
                        %defender,
                        attack = %attack.id,
                        "critical hit"
                    );
                }

                let request = HitRequest::new(penetration, attack.damage_type)
                    .from_attacker(attacker)
                    .with_attack(attack.id);
                let result = match self.apply_hit(defender, &request) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(%attacker, %defender, error = %err, "blow could not be resolved");
                        return;
                    }
                };

                self.add_panic_source(attacker, PanicSource::HitLanded);
                self.broadcast(messages::hit(
                    (attacker, &exchange.attacker_name),
                    (defender, &exchange.defender_name),
                    &attack.label,
                    &result.location_description,
                    Hurt::from_percent(result.hurt_percent),
                    critical,
                ));
                if result.killed {
                    self.finish_kill(defender, Some(attacker));
                }
            }
        }
    }

    // === DEATH ===

    /// Death bookkeeping after the killing blow has been reported
    pub(crate) fn finish_kill(&mut self, victim: EntityId, killer: Option<EntityId>) {
        let Some(entity) = self.entities.get_mut(&victim) else {
            return;
        };
        if entity.is_ghost() {
            return;
        }
        entity.on_death(killer);
        let victim_name = entity.name().to_string();
        self.stats.kills += 1;
        info!(%victim, ?killer, "{victim_name} died");

        match killer.and_then(|k| self.entities.get_mut(&k).map(|e| (k, e))) {
            Some((k, killer_entity)) => {
                killer_entity.grant_combat_reward(victim, 0, true);
                let killer_name = killer_entity.name().to_string();
                self.broadcast(messages::death((k, &killer_name), (victim, &victim_name)));
            }
            None => self.broadcast(Broadcast::room(
                victim,
                "You die.",
                format!("{victim_name} dies."),
            )),
        }

        for session in self.sessions.values_mut() {
            session.remove_enemy(victim);
        }
        if let Some(session) = self.sessions.get_mut(&victim) {
            session.set_target(None);
        }
        self.wind_down(victim);
        self.cancel_engagements_where(|e| e.archer == victim, CancelReason::ArcherDied);
        self.cancel_engagements_where(|e| e.target == victim, CancelReason::TargetGone);
    }

    /// Stop the heartbeat, forget enemies and queue teardown
    fn wind_down(&mut self, id: EntityId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.clear_enemies();
            session.panic.clear();
            session.state = SessionState::Idle;
            if let Some(handle) = session.heartbeat.take() {
                self.scheduler.cancel(handle);
            }
        }
        self.schedule_teardown(id);
    }

    /// Drop an idle session; one holding equipment or custom tables is only reset
    pub(crate) fn teardown(&mut self, id: EntityId) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        session.teardown = None;
        if session.has_enemies() || session.heartbeat.is_some() {
            return;
        }
        if session.slots.is_empty() && !session.configured {
            self.sessions.remove(&id);
            debug!(entity = %id, "session torn down");
        } else {
            session.panic.clear();
            session.rounds = 0;
            session.state = SessionState::Idle;
        }
    }

    // === MORALE ===

    fn should_flee(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };
        let discipline = entity.stat_value(Stat::Discipline);
        let wimpy = entity.wimpy_percent();
        let wimpy_hit = wimpy > 0 && entity.hit_points() * 100 < wimpy * entity.max_hit_points();

        let Some(session) = self.sessions.get(&id) else {
            return false;
        };
        match session.panic.check(&mut self.rng, discipline, &self.config) {
            BreakResult::Breaking => {
                info!(entity = %id, panic = session.panic.level(), "morale broke");
                true
            }
            BreakResult::Shaken => {
                debug!(entity = %id, panic = session.panic.level(), "shaken");
                wimpy_hit
            }
            BreakResult::Holding => wimpy_hit,
        }
    }

    /// Run through a random exit, spreading panic to teammates left behind
    pub(crate) fn flee(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let name = entity.name().to_string();
        let room = entity.location();
        let team = entity.team();

        let mut exits = self.world.exits(room);
        exits.shuffle(&mut self.rng);
        let exit = exits.into_iter().next();
        self.broadcast(messages::flee((id, &name), exit.as_ref().map(|e| e.direction.as_str())));

        let share = self
            .sessions
            .get(&id)
            .map(|s| s.panic.contagion(&self.config))
            .unwrap_or(0);
        if let (Some(team), true) = (team, share > 0) {
            let mates: Vec<EntityId> = self
                .order
                .iter()
                .copied()
                .filter(|other| *other != id)
                .filter(|other| {
                    self.entities.get(other).is_some_and(|e| {
                        !e.is_ghost() && e.team() == Some(team) && e.location() == room
                    })
                })
                .collect();
            for mate in mates {
                if let Ok(session) = self.ensure_session(mate) {
                    session.panic.add(share);
                }
            }
        }

        let Some(exit) = exit else {
            self.schedule_round(id);
            return;
        };

        self.stats.flees += 1;
        info!(entity = %id, direction = %exit.direction, "fled");
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.set_location(exit.to);
        }
        if let Some(session) = self.sessions.get_mut(&id) {
            session.set_target(None);
            session.state = SessionState::Hunting;
            let level = session.panic.level();
            session.panic.add(-level / 2);
            if let Some(handle) = session.heartbeat.take() {
                self.scheduler.cancel(handle);
            }
        }
        self.cancel_engagements_where(|e| e.archer == id, CancelReason::ArcherMoved);
        self.scheduler
            .schedule_after(self.config.flee_recovery_delay, Task::FleeRecovery(id));
    }

    /// Back from a flight: resume rounds if anything is left to fight
    pub(crate) fn recover_from_flee(&mut self, id: EntityId) {
        if !self.is_alive(id) {
            return;
        }
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if session.has_enemies() && session.heartbeat.is_none() {
            session.heartbeat = Some(self.scheduler.schedule_after(0, Task::Round(id)));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::combat::damage::ArmorClass;
    use crate::combat::hit_location::{HitLocation, HitLocationTable, LocationId};
    use crate::combat::session::SessionState;
    use crate::core::config::CombatConfig;
    use crate::core::types::RoomId;
    use crate::entity::creature::Creature;
    use crate::entity::living::LivingEntity;
    use crate::simulation::arena::CombatArena;
    use crate::world::surroundings::RoomGraph;

    fn arena(world: RoomGraph) -> CombatArena<Creature, RoomGraph> {
        CombatArena::new(CombatConfig::default(), world, 11).unwrap()
    }

    #[test]
    fn test_duel_ends_with_one_dead() {
        let mut arena = arena(RoomGraph::new());
        let a = arena.register(Creature::humanoid("Aldo", 20, RoomId(0)).trained(40));
        let b = arena.register(Creature::humanoid("Bera", 20, RoomId(0)).trained(40));
        arena.attack(a, b, false).unwrap();
        arena.run_until_idle(100_000);

        let dead = [a, b]
            .iter()
            .filter(|id| arena.entity(**id).unwrap().is_ghost())
            .count();
        assert_eq!(dead, 1);
        assert_eq!(arena.stats().kills, 1);
        assert!(arena.query_enemies(a).is_empty());
        assert!(arena.query_enemies(b).is_empty());
    }

    #[test]
    fn test_lone_hunter_goes_idle_after_grace() {
        let mut world = RoomGraph::new();
        world.connect(RoomId(0), "north", RoomId(1));
        let mut arena = arena(world);
        let a = arena.register(Creature::humanoid("Aldo", 20, RoomId(0)));
        let b = arena.register(Creature::humanoid("Bera", 20, RoomId(0)));
        arena.attack(a, b, false).unwrap();
        arena.move_entity(b, RoomId(1)).unwrap();
        arena.stop_fighting(b, &[a]).unwrap();

        arena.advance(1);
        assert_eq!(arena.session_state(a), SessionState::Hunting);

        let grace = arena.config().grace_period;
        arena.advance(grace + arena.config().round_interval);
        assert_eq!(arena.session_state(a), SessionState::Idle);
        assert!(arena.query_enemies(a).is_empty());
    }

    #[test]
    fn test_idle_session_torn_down() {
        let mut arena = arena(RoomGraph::new());
        let a = arena.register(Creature::humanoid("Aldo", 20, RoomId(0)));
        let b = arena.register(Creature::humanoid("Bera", 20, RoomId(0)));
        arena.attack(a, b, false).unwrap();
        arena.stop_fighting(a, &[b]).unwrap();
        arena.stop_fighting(b, &[a]).unwrap();
        arena.run_until_idle(10_000);
        assert!(arena.session(a).is_none());
        assert!(arena.session(b).is_none());
    }

    #[test]
    fn test_configured_tables_survive_teardown() {
        let mut arena = arena(RoomGraph::new());
        let turtle = arena.register(Creature::humanoid("Shelly", 20, RoomId(0)));
        let b = arena.register(Creature::humanoid("Bera", 20, RoomId(0)));
        let mut shell = HitLocationTable::new();
        shell
            .add_hit_location(HitLocation::new(
                LocationId::Body,
                ArmorClass::uniform(30),
                100,
                "shell",
            ))
            .unwrap();
        arena
            .configure_session(turtle, |s| s.hit_locations = shell)
            .unwrap();

        arena.attack(b, turtle, false).unwrap();
        arena.stop_fighting(turtle, &[b]).unwrap();
        arena.stop_fighting(b, &[turtle]).unwrap();
        arena.run_until_idle(10_000);
        assert!(arena.session(b).is_none());

        arena.attack(b, turtle, false).unwrap();
        let locations: Vec<&str> = arena
            .session(turtle)
            .unwrap()
            .hit_locations
            .all()
            .iter()
            .map(|l| l.description.as_str())
            .collect();
        assert_eq!(locations, ["shell"]);
    }

    #[test]
    fn test_panicked_fighter_flees_through_exit() {
        let mut world = RoomGraph::new();
        world.connect(RoomId(0), "south", RoomId(5));
        let mut arena = arena(world);
        let a = arena.register(Creature::humanoid("Aldo", 20, RoomId(0)));
        let b = arena.register(Creature::humanoid("Bera", 20, RoomId(0)));
        arena.attack(a, b, false).unwrap();
        arena.add_panic(a, 10_000).unwrap();
        arena.advance(0);

        assert_eq!(arena.entity(a).unwrap().location(), RoomId(5));
        assert_eq!(arena.stats().flees, 1);
        let heard = arena.drain_messages();
        assert!(heard.iter().any(|d| d.recipient == a && d.text == "You panic and flee south!"));
    }

    #[test]
    fn test_flee_spreads_panic_to_team() {
        let mut world = RoomGraph::new();
        world.connect(RoomId(0), "south", RoomId(5));
        let mut arena = arena(world);
        let a = arena.register(Creature::humanoid("Aldo", 20, RoomId(0)).with_team(1));
        let mate = arena.register(Creature::humanoid("Cato", 20, RoomId(0)).with_team(1));
        let b = arena.register(Creature::humanoid("Bera", 20, RoomId(0)));
        arena.attack(a, b, false).unwrap();
        arena.add_panic(a, 10_000).unwrap();
        arena.flee(a);
        assert!(arena.panic_level(mate) > 0);
        assert_eq!(arena.panic_level(b), 0);
    }
}
