pub mod creature;
pub mod living;

pub use creature::Creature;
pub use living::{LivingEntity, Skill, Stat};
