//! Per-round hooks: incapacity, attack delay, special attacks, vetoes, wimpy

use std::cell::Cell;

use skirmish::combat::AttackId;
use skirmish::core::config::CombatConfig;
use skirmish::core::types::{EntityId, ItemId, RoomId};
use skirmish::entity::{Creature, LivingEntity, Skill, Stat};
use skirmish::simulation::CombatArena;
use skirmish::world::RoomGraph;

/// A creature whose round hooks are scripted by the test
#[derive(Debug)]
struct Scripted {
    body: Creature,
    special: bool,
    specials_used: u32,
    allowed: Option<AttackId>,
    vetoes: Cell<u32>,
}

impl Scripted {
    fn new(body: Creature) -> Self {
        Self {
            body,
            special: false,
            specials_used: 0,
            allowed: None,
            vetoes: Cell::new(0),
        }
    }
}

impl LivingEntity for Scripted {
    fn id(&self) -> EntityId {
        self.body.id()
    }

    fn name(&self) -> &str {
        self.body.name()
    }

    fn stat_value(&self, stat: Stat) -> i32 {
        self.body.stat_value(stat)
    }

    fn skill_value(&self, skill: Skill) -> i32 {
        self.body.skill_value(skill)
    }

    fn hit_points(&self) -> i32 {
        self.body.hit_points()
    }

    fn max_hit_points(&self) -> i32 {
        self.body.max_hit_points()
    }

    fn reduce_hit_points(&mut self, amount: i32) {
        self.body.reduce_hit_points(amount)
    }

    fn fatigue(&self) -> i32 {
        self.body.fatigue()
    }

    fn add_fatigue(&mut self, amount: i32) {
        self.body.add_fatigue(amount)
    }

    fn is_ghost(&self) -> bool {
        self.body.is_ghost()
    }

    fn is_stunned(&self) -> bool {
        self.body.is_stunned()
    }

    fn is_fumbling(&self) -> bool {
        self.body.is_fumbling()
    }

    fn is_wizard(&self) -> bool {
        self.body.is_wizard()
    }

    fn is_interactive(&self) -> bool {
        self.body.is_interactive()
    }

    fn is_humanoid(&self) -> bool {
        self.body.is_humanoid()
    }

    fn attack_delay(&self) -> u32 {
        self.body.attack_delay()
    }

    fn set_attack_delay(&mut self, rounds: u32) {
        self.body.set_attack_delay(rounds)
    }

    fn encumbrance_weight(&self) -> i32 {
        self.body.encumbrance_weight()
    }

    fn encumbrance_volume(&self) -> i32 {
        self.body.encumbrance_volume()
    }

    fn location(&self) -> RoomId {
        self.body.location()
    }

    fn set_location(&mut self, room: RoomId) {
        self.body.set_location(room)
    }

    fn wimpy_percent(&self) -> i32 {
        self.body.wimpy_percent()
    }

    fn inventory(&self) -> &[ItemId] {
        self.body.inventory()
    }

    fn add_to_inventory(&mut self, item: ItemId) {
        self.body.add_to_inventory(item)
    }

    fn remove_from_inventory(&mut self, item: ItemId) -> bool {
        self.body.remove_from_inventory(item)
    }

    fn special_attack(&mut self, _target: EntityId) -> bool {
        if self.special {
            self.specials_used += 1;
        }
        self.special
    }

    fn veto_attack(&self, _target: EntityId, attack: AttackId) -> bool {
        let veto = self.allowed.is_some_and(|allowed| allowed != attack);
        if veto {
            self.vetoes.set(self.vetoes.get() + 1);
        }
        veto
    }

    fn on_death(&mut self, killer: Option<EntityId>) {
        self.body.on_death(killer)
    }
}

fn fighter(name: &str) -> Creature {
    let mut c = Creature::humanoid(name, 20, RoomId(0)).trained(40);
    c.wizard = true;
    c
}

fn arena_in(world: RoomGraph) -> CombatArena<Scripted, RoomGraph> {
    CombatArena::new(CombatConfig::default(), world, 77).unwrap()
}

#[test]
fn test_stunned_or_fumbling_fighter_skips_rounds() {
    for fumble in [false, true] {
        let mut arena = arena_in(RoomGraph::new());
        let mut body = fighter("Aldo");
        if fumble {
            body.fumbling = true;
        } else {
            body.stunned = true;
        }
        let a = arena.register(Scripted::new(body));
        let b = arena.register(Scripted::new(fighter("Bera")));
        arena.attack(a, b, false).unwrap();

        let interval = arena.config().round_interval;
        arena.advance(interval * 5);
        assert_eq!(arena.session(a).unwrap().rounds, 0);
        assert!(arena.session(b).unwrap().rounds > 0);
    }
}

#[test]
fn test_attack_delay_counts_down_before_attacking() {
    let mut arena = arena_in(RoomGraph::new());
    let mut body = fighter("Aldo");
    body.attack_delay = 2;
    let a = arena.register(Scripted::new(body));
    let b = arena.register(Scripted::new(fighter("Bera")));
    arena.attack(a, b, false).unwrap();

    arena.advance(0);
    assert_eq!(arena.entity(a).unwrap().attack_delay(), 1);
    assert_eq!(arena.session(a).unwrap().rounds, 0);

    let interval = arena.config().round_interval;
    arena.advance(interval);
    assert_eq!(arena.entity(a).unwrap().attack_delay(), 0);
    assert_eq!(arena.session(a).unwrap().rounds, 0);

    arena.advance(interval);
    assert_eq!(arena.session(a).unwrap().rounds, 1);
}

#[test]
fn test_special_attack_consumes_the_round() {
    let mut arena = arena_in(RoomGraph::new());
    let mut caster = Scripted::new(fighter("Aldo"));
    caster.special = true;
    let a = arena.register(caster);
    let mut dummy = fighter("Bera");
    dummy.stunned = true;
    let b = arena.register(Scripted::new(dummy));
    arena.attack(a, b, false).unwrap();

    let interval = arena.config().round_interval;
    arena.advance(interval * 4);
    assert!(arena.entity(a).unwrap().specials_used >= 4);
    assert_eq!(arena.session(a).unwrap().rounds, 0);
    assert_eq!(arena.stats().attacks, 0);
}

#[test]
fn test_veto_suppresses_single_attacks() {
    let mut arena = arena_in(RoomGraph::new());
    let mut picky = Scripted::new(fighter("Aldo"));
    picky.allowed = Some(AttackId::RightHand);
    let a = arena.register(picky);
    let mut dummy = fighter("Bera");
    dummy.stunned = true;
    let b = arena.register(Scripted::new(dummy));
    arena.attack(a, b, false).unwrap();

    let interval = arena.config().round_interval;
    arena.advance(interval * 200);

    assert!(arena.entity(a).unwrap().vetoes.get() > 0);
    assert!(arena.stats().attacks > 0);
    let heard: Vec<String> = arena
        .drain_messages()
        .into_iter()
        .filter(|d| d.recipient == a)
        .map(|d| d.text)
        .collect();
    assert!(heard.iter().any(|t| t.contains("right hand")));
    for text in &heard {
        assert!(!text.contains("left hand"), "vetoed attack used: {text}");
        assert!(!text.contains("foot"), "vetoed attack used: {text}");
    }
}

#[test]
fn test_wimpy_fighter_flees_when_hurt() {
    let mut world = RoomGraph::new();
    world.connect(RoomId(0), "south", RoomId(5));
    let mut arena = arena_in(world);
    let mut body = fighter("Aldo");
    body.wimpy = 60;
    body.hit_points = body.max_hit_points / 2;
    let a = arena.register(Scripted::new(body));
    let b = arena.register(Scripted::new(fighter("Bera")));
    arena.attack(a, b, false).unwrap();

    arena.advance(0);
    assert_eq!(arena.entity(a).unwrap().location(), RoomId(5));
    assert_eq!(arena.stats().flees, 1);
}

#[test]
fn test_healthy_wimpy_fighter_stands() {
    let mut arena = arena_in(RoomGraph::new());
    let mut body = fighter("Aldo");
    body.wimpy = 60;
    let a = arena.register(Scripted::new(body));
    let b = arena.register(Scripted::new(fighter("Bera")));
    arena.attack(a, b, false).unwrap();

    arena.advance(0);
    assert_eq!(arena.entity(a).unwrap().location(), RoomId(0));
    assert_eq!(arena.stats().flees, 0);
}
