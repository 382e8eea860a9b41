//! Ranged engagement: aim, load, ready, fire
//!
//! An engagement lives from aiming until the shot is fired, unloaded or
//! cancelled. It holds at most one projectile and its own timer handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combat::damage::{DamageType, Penetration};
use crate::combat::weapons::{Launcher, Projectile};
use crate::core::config::CombatConfig;
use crate::core::types::{EngagementId, EntityId, ItemId, RoomId, Tick};
use crate::simulation::heartbeat::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangedState {
    /// Target chosen, nothing loaded
    Aiming,
    /// Projectile loaded, waiting out the ready delay
    Loaded,
    Ready,
}

/// Why an engagement ended without a shot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    ArcherMoved,
    TargetGone,
    TargetMoved,
    WeaponUnwielded,
    DrawFatigue,
    ArcherDied,
    Unloaded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CancelReason::ArcherMoved => "you moved",
            CancelReason::TargetGone => "your target is gone",
            CancelReason::TargetMoved => "your target moved out of sight",
            CancelReason::WeaponUnwielded => "you stopped wielding the weapon",
            CancelReason::DrawFatigue => "your arms tire of holding the draw",
            CancelReason::ArcherDied => "you died",
            CancelReason::Unloaded => "you unloaded",
        };
        f.write_str(text)
    }
}

/// Result of a fire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireOutcome {
    Hit { damage: i32, killed: bool },
    Missed,
    Cancelled(CancelReason),
}

#[derive(Debug, Clone)]
pub struct RangedEngagement {
    pub id: EngagementId,
    pub archer: EntityId,
    pub launcher: ItemId,
    pub target: EntityId,
    /// Archer's room when aiming
    pub archer_room: RoomId,
    /// Target's room when aiming
    pub target_room: RoomId,
    pub state: RangedState,
    pub projectile: Option<ItemId>,
    /// Where the projectile came from, so unloading can put it back
    pub source: Option<ItemId>,
    pub ready_timer: Option<TaskHandle>,
    pub fatigue_timer: Option<TaskHandle>,
    pub loaded_at: Option<Tick>,
}

impl RangedEngagement {
    pub fn new(
        id: EngagementId,
        archer: EntityId,
        launcher: ItemId,
        target: EntityId,
        archer_room: RoomId,
        target_room: RoomId,
    ) -> Self {
        Self {
            id,
            archer,
            launcher,
            target,
            archer_room,
            target_room,
            state: RangedState::Aiming,
            projectile: None,
            source: None,
            ready_timer: None,
            fatigue_timer: None,
            loaded_at: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.projectile.is_some()
    }

    /// Timer handles still held, emptied
    pub fn take_timers(&mut self) -> Vec<TaskHandle> {
        self.ready_timer
            .take()
            .into_iter()
            .chain(self.fatigue_timer.take())
            .collect()
    }
}

/// Ticks from loading to ready: faster with dexterity, never below the minimum
pub fn ready_delay(launcher: &Launcher, dexterity: i32, config: &CombatConfig) -> Tick {
    let reduction = (dexterity.max(0) / 25) as Tick;
    launcher
        .ready_delay
        .saturating_sub(reduction)
        .max(config.min_ready_delay)
}

/// To-hit and penetration of a shot: launcher and projectile averaged
///
/// Shots always strike with the impale column.
pub fn shot_profile(
    launcher: &Launcher,
    projectile: &Projectile,
) -> (i32, Penetration, DamageType) {
    let to_hit = (launcher.to_hit + projectile.to_hit) / 2;
    let pen = (launcher.penetration + projectile.penetration) / 2;
    (to_hit, Penetration::new(pen, 0, 0), DamageType::IMPALE)
}
