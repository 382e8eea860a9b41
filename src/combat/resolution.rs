//! Attack resolution: to-hit, penetration against armour, hit location
//!
//! Pure functions over read-only snapshots. Nothing here touches a session
//! or an entity; the caller applies the returned values afterwards.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::attack::{Attack, AttackTable};
use crate::combat::constants::{
    BURDEN_WEIGHT, DEXTERITY_WEIGHT, MAX_ENCUMBRANCE_PERCENT, MAX_SKILL, PEN_SKILL_BASE,
    PEN_SKILL_DIVISOR, PEN_STRENGTH_CAP, PEN_STRENGTH_DIVISOR, ROLLS_PER_CHECK,
    WEAPON_VS_DEFENSE_WEIGHT, WEAPON_VS_PARRY_WEIGHT,
};
use crate::combat::damage::{Column, DamageType, Penetration};
use crate::combat::hit_location::{HitLocation, HitLocationTable, LocationId};
use crate::entity::living::{LivingEntity, Skill, Stat};

/// Map an offense/defense pair onto -50..=50
///
/// `100 * offense / (offense + defense) - 50`, rounded to nearest, and 0
/// when both sides are 0.
pub fn normalize(offense: i32, defense: i32) -> i32 {
    let offense = i64::from(offense.max(0));
    let defense = i64::from(defense.max(0));
    let sum = offense + defense;
    if sum == 0 {
        return 0;
    }
    let scaled = (200 * offense + sum) / (2 * sum);
    (scaled - 50) as i32
}

/// Penetration after skill and strength scaling
pub fn modified_penetration(raw: Penetration, skill: i32, strength: i32) -> Penetration {
    let skill = skill.clamp(0, MAX_SKILL);
    let strength = strength.clamp(0, PEN_STRENGTH_CAP);
    raw.map(|pen| {
        let pen = pen.max(0);
        pen * (PEN_SKILL_BASE + skill) / PEN_SKILL_DIVISOR + pen * strength / PEN_STRENGTH_DIVISOR
    })
}

/// Sum of `ROLLS_PER_CHECK` uniform draws in `0..sides`
///
/// Summing several draws narrows the spread compared to a single roll.
pub fn sum_rolls<R: Rng + ?Sized>(rng: &mut R, sides: i32) -> i32 {
    if sides <= 0 {
        return 0;
    }
    (0..ROLLS_PER_CHECK).map(|_| rng.gen_range(0..sides)).sum()
}

/// What the resolver needs to know about one side of a blow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantView {
    pub dexterity: i32,
    pub parry: i32,
    pub defense: i32,
    pub unarmed: i32,
    pub blind_fighting: i32,
    /// max(weight, volume) as a percent of capacity, 0..=100
    pub encumbrance: i32,
    /// Wields at least one weapon
    pub armed: bool,
    /// Can see its opponent
    pub can_see: bool,
}

impl CombatantView {
    /// Snapshot an entity; `armed` and `can_see` come from the session and the room
    pub fn of<E: LivingEntity + ?Sized>(entity: &E, armed: bool, can_see: bool) -> Self {
        let encumbrance = entity
            .encumbrance_weight()
            .max(entity.encumbrance_volume())
            .clamp(0, MAX_ENCUMBRANCE_PERCENT);
        Self {
            dexterity: entity.stat_value(Stat::Dexterity),
            parry: entity.skill_value(Skill::Parry),
            defense: entity.skill_value(Skill::Defense),
            unarmed: entity.skill_value(Skill::UnarmedCombat),
            blind_fighting: entity.skill_value(Skill::BlindFighting),
            encumbrance,
            armed,
            can_see,
        }
    }

    /// Parry against the blow: weapon parry if armed, else half unarmed skill,
    /// reduced by encumbrance
    pub fn parry_value(&self) -> i32 {
        let base = if self.armed {
            self.parry
        } else {
            self.unarmed / 2
        };
        base.max(0) * (MAX_ENCUMBRANCE_PERCENT - self.encumbrance) / MAX_ENCUMBRANCE_PERCENT
    }

    /// Scale a value by blind fighting when this side cannot see
    fn sighted(&self, value: i32) -> i32 {
        if self.can_see {
            value
        } else {
            value * self.blind_fighting.clamp(0, MAX_SKILL) / MAX_SKILL
        }
    }
}

/// How a miss came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissKind {
    /// Defender was armed and turned the blow
    Parried,
    /// Defender was unarmed and stepped aside
    Dodged,
}

/// Outcome of a to-hit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToHit {
    Hit,
    /// `magnitude` is negative; the further below zero the clearer the miss
    Miss { magnitude: i32, kind: MissKind },
}

impl ToHit {
    pub fn is_hit(&self) -> bool {
        matches!(self, ToHit::Hit)
    }
}

/// Does a blow with weapon class `weapon_hit`, wielded at `skill`, land?
///
/// Four normalized factors: weapon class against parry, the wielder's skill
/// against defense, free carrying capacity, and dexterity.
pub fn to_hit<R: Rng + ?Sized>(
    rng: &mut R,
    weapon_hit: i32,
    skill: i32,
    attacker: &CombatantView,
    defender: &CombatantView,
) -> ToHit {
    let wchit = attacker.sighted(weapon_hit.max(0));
    let skill = attacker.sighted(skill.max(0));
    let parry = defender.sighted(defender.parry_value());
    let defense = defender.sighted(defender.defense.max(0));

    let against_parry = normalize(sum_rolls(rng, wchit), sum_rolls(rng, parry));
    let against_defense = normalize(sum_rolls(rng, skill), sum_rolls(rng, defense));
    let burden = normalize(
        MAX_ENCUMBRANCE_PERCENT - attacker.encumbrance,
        MAX_ENCUMBRANCE_PERCENT - defender.encumbrance,
    );
    let dexterity = normalize(attacker.dexterity, defender.dexterity);

    let total = WEAPON_VS_PARRY_WEIGHT * against_parry
        + WEAPON_VS_DEFENSE_WEIGHT * against_defense
        + BURDEN_WEIGHT * burden
        + DEXTERITY_WEIGHT * dexterity;

    if total > 0 {
        ToHit::Hit
    } else {
        ToHit::Miss {
            magnitude: total - 1,
            kind: if defender.armed {
                MissKind::Parried
            } else {
                MissKind::Dodged
            },
        }
    }
}

/// Randomized armour block for one armour class value
///
/// Never below half the armour class.
fn block_roll<R: Rng + ?Sized>(rng: &mut R, armor_class: i32) -> i32 {
    let ac = armor_class.max(0);
    if ac == 0 {
        return 0;
    }
    ac / 2 + rng.gen_range(0..=ac / 2)
}

/// Dice size for a penetration value
fn penetration_sides(pen: i32) -> i32 {
    if pen <= 0 {
        0
    } else {
        (pen + 3) / 4
    }
}

/// Damage from one landed blow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blow {
    pub damage: i32,
    /// Column the blow was dealt with; None for magic
    pub column: Option<Column>,
}

/// Roll penetration against the armour of `location`
///
/// Magic ignores armour and rolls the best column without a block.
pub fn resolve_hit<R: Rng + ?Sized>(
    rng: &mut R,
    penetration: Penetration,
    damage_type: DamageType,
    location: &HitLocation,
) -> Blow {
    let physical = damage_type & !DamageType::MAGIC;
    if damage_type.contains(DamageType::MAGIC) || physical.is_empty() {
        let pen = penetration
            .impale
            .max(penetration.slash)
            .max(penetration.bludgeon);
        return Blow {
            damage: sum_rolls(rng, penetration_sides(pen)),
            column: None,
        };
    }

    let Some(column) = physical.pick_column(rng) else {
        return Blow {
            damage: 0,
            column: None,
        };
    };

    let roll = sum_rolls(rng, penetration_sides(penetration.get(column)));
    let block = block_roll(rng, location.modified_armor_class.get(column));
    Blow {
        damage: (roll - block).max(0),
        column: Some(column),
    }
}

/// Walk the cumulative hit distribution for `roll` in 1..=100
///
/// If the table never reaches the roll the last location is used and the
/// anomaly logged. None only for an empty table.
pub fn pick_hit_location(table: &HitLocationTable, roll: i32) -> Option<LocationId> {
    let mut cumulative = 0;
    for location in table.all() {
        cumulative += location.hit_probability;
        if cumulative >= roll {
            return Some(location.id);
        }
    }

    let last = table.all().last()?;
    tracing::warn!(
        roll,
        total = cumulative,
        fallback = ?last.id,
        "Bad hit location table: cumulative probability never reached roll"
    );
    Some(last.id)
}

/// One blow in `odds` is critical
pub fn roll_critical<R: Rng + ?Sized>(rng: &mut R, odds: u32) -> bool {
    odds > 0 && rng.gen_range(0..odds) == 0
}

/// Spread `budget` percent of use across eligible attacks
///
/// Each eligible attack gets a share proportional to
/// `to_hit * mean modified penetration`; ineligible attacks get 0.
pub fn redistribute_attack_use<F>(table: &mut AttackTable, budget: i32, eligible: F)
where
    F: Fn(&Attack) -> bool,
{
    let weight = |attack: &Attack| -> i64 {
        let pen = attack
            .modified_penetration
            .mean_over(attack.damage_type)
            .max(1);
        i64::from(attack.to_hit.max(1)) * i64::from(pen)
    };

    let total: i64 = table
        .all()
        .iter()
        .filter(|a| eligible(a))
        .map(weight)
        .sum();

    let budget = i64::from(budget.max(0));
    let decisions: Vec<bool> = table.all().iter().map(|a| eligible(a)).collect();
    for (attack, is_eligible) in table.iter_mut().zip(decisions) {
        attack.use_probability = if is_eligible && total > 0 {
            (budget * weight(attack) / total).clamp(0, 100) as i32
        } else {
            0
        };
    }
}

/// Describe hurt as a share of the hit points the defender had
pub fn hurt_percent(damage: i32, hit_points_before: i32) -> i32 {
    if hit_points_before <= 0 {
        return 100;
    }
    (damage.max(0) * 100 / hit_points_before).min(100)
}
