//! Combat resolution core
//!
//! Tables, equipment traits, the pure resolver, and the per-combatant
//! session. Scheduling and cross-entity effects live in `simulation`.

pub mod armor;
pub mod attack;
pub mod constants;
pub mod damage;
pub mod equipment;
pub mod hit_location;
pub mod messages;
pub mod morale;
pub mod ranged;
pub mod resolution;
pub mod session;
pub mod tool_slots;
pub mod weapons;

pub use armor::{Armor, ArmorPiece, Material};
pub use attack::{Attack, AttackId, AttackTable};
pub use damage::{ArmorClass, Column, DamageType, Penetration};
pub use equipment::{Kit, Loadout, Tool};
pub use hit_location::{HitLocation, HitLocationTable, LocationId};
pub use messages::{Broadcast, Delivery, Hurt};
pub use morale::{BreakResult, Panic, PanicSource};
pub use ranged::{CancelReason, FireOutcome, RangedEngagement, RangedState};
pub use resolution::{
    modified_penetration, normalize, pick_hit_location, resolve_hit, to_hit, Blow, CombatantView,
    MissKind, ToHit,
};
pub use session::{CombatSession, SessionState, WieldSkills};
pub use tool_slots::{SlotConflict, ToolSlot, ToolSlotRegistry};
pub use weapons::{Hands, Launcher, MeleeWeapon, Projectile, ProjectileKind, Quiver, Weapon};
