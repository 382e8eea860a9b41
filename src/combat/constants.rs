//! Combat model constants - the fixed parts of the formulas
//!
//! Per-deployment tunables live in `core::config::CombatConfig`.

// Table capacities
pub const MAX_ATTACKS: usize = 10;
pub const MAX_HIT_LOCATIONS: usize = 10;

/// Hit probabilities of one entity's locations sum to this
pub const TOTAL_HIT_PROBABILITY: i32 = 100;

// Dice: every to-hit and penetration roll sums this many uniform draws
pub const ROLLS_PER_CHECK: u32 = 4;

// To-hit factor weights
pub const WEAPON_VS_PARRY_WEIGHT: i32 = 4;
pub const WEAPON_VS_DEFENSE_WEIGHT: i32 = 2;
pub const BURDEN_WEIGHT: i32 = 1;
pub const DEXTERITY_WEIGHT: i32 = 1;

// Skills are expressed on a 0..=100 scale
pub const MAX_SKILL: i32 = 100;

// Penetration scaling: pen * (PEN_SKILL_BASE + skill) / PEN_SKILL_DIVISOR
pub const PEN_SKILL_BASE: i32 = 50;
pub const PEN_SKILL_DIVISOR: i32 = 100;
/// Strength contributes pen * min(str, cap) / divisor on top of skill
pub const PEN_STRENGTH_CAP: i32 = 150;
pub const PEN_STRENGTH_DIVISOR: i32 = 300;

// Encumbrance above this percentage no longer reduces parry further
pub const MAX_ENCUMBRANCE_PERCENT: i32 = 100;
