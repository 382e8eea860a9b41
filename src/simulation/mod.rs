//! Combat driving: the arena, its heartbeat scheduler, rounds and archery

pub mod arena;
pub mod archery;
pub mod heartbeat;
pub mod round;

pub use arena::{CombatArena, CombatStats, HitRequest, HitResult};
pub use heartbeat::{HeartbeatScheduler, Task, TaskHandle};
