//! Combat configuration with documented constants
//!
//! Every per-deployment tunable is collected here. Values that are part of
//! the model itself (table capacities, dice counts) live in
//! `combat::constants` instead.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::error::{CombatError, Result};
use crate::core::types::Tick;

/// Configuration for the combat core
///
/// These values have been tuned so that two evenly matched humanoids trade
/// blows for a handful of rounds before one of them breaks or falls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === SCHEDULING ===
    /// Ticks between two combat rounds of the same session
    pub round_interval: Tick,

    /// Ticks without a blow given or received before a session gives up
    ///
    /// At the default of 30 with a 5 tick round, a session hunts for six
    /// rounds before dropping its enemies.
    pub grace_period: Tick,

    /// Ticks an idle session lingers before it is torn down
    pub teardown_delay: Tick,

    /// Ticks before a fleeing entity re-evaluates its targets
    pub flee_recovery_delay: Tick,

    // === ENEMIES ===
    /// Maximum remembered enemies; the oldest is forgotten beyond this
    pub enemy_cap: usize,

    // === MORALE ===
    /// Panic removed from the attacker after a landed blow
    pub panic_on_hit: i32,

    /// Panic added to the attacker after a miss
    pub panic_on_miss: i32,

    /// Panic added to a defender for every blow received
    pub panic_when_hit: i32,

    /// Panic shed each round while not exchanging blows
    pub panic_decay: i32,

    /// Base of the morale threshold: `threshold = base + discipline * factor`
    pub panic_threshold_base: i32,

    /// Discipline multiplier of the morale threshold
    pub discipline_factor: i32,

    /// Share of its own panic a fleeing entity passes to present teammates
    pub panic_contagion_percent: i32,

    // === FATIGUE ===
    /// Fatigue spent by an entity for every round it fights
    pub fatigue_per_round: i32,

    // === CRITICAL HITS ===
    /// One blow in this many is a critical hit
    pub critical_odds: u32,

    /// Penetration multiplier applied by a critical hit
    pub critical_multiplier: i32,

    // === HUMANOID ATTACKS ===
    /// Total use percentage a humanoid spreads across its attacks each round
    pub humanoid_attack_budget: i32,

    /// Extra to-hit of a bare hand or foot on top of half the unarmed skill;
    /// 0 leaves a mirror match even
    pub unarmed_hit_base: i32,

    /// Base penetration of a bare hand or foot before unarmed skill
    pub unarmed_pen_base: i32,

    // === RANGED ===
    /// Ticks a drawn weapon may stay loaded before it is forcibly unloaded
    pub draw_fatigue_threshold: Tick,

    /// Fatigue charged when a drawn weapon is forcibly unloaded
    pub draw_fatigue_cost: i32,

    /// Minimum delay between loading and being ready to fire
    pub min_ready_delay: Tick,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            round_interval: 5,
            grace_period: 30,
            teardown_delay: 60,
            flee_recovery_delay: 1,

            enemy_cap: 10,

            panic_on_hit: 3,
            panic_on_miss: 1,
            panic_when_hit: 2,
            panic_decay: 5,
            panic_threshold_base: 10,
            discipline_factor: 3,
            panic_contagion_percent: 20,

            fatigue_per_round: 1,

            critical_odds: 10_000,
            critical_multiplier: 5,

            humanoid_attack_budget: 100,
            unarmed_hit_base: 0,
            unarmed_pen_base: 6,

            draw_fatigue_threshold: 40,
            draw_fatigue_cost: 5,
            min_ready_delay: 1,
        }
    }
}

impl CombatConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CombatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.round_interval == 0 {
            return Err(CombatError::Config("round_interval must be positive".into()));
        }

        if self.grace_period < self.round_interval {
            return Err(CombatError::Config(format!(
                "grace_period ({}) should be >= round_interval ({})",
                self.grace_period, self.round_interval
            )));
        }

        if self.enemy_cap == 0 {
            return Err(CombatError::Config("enemy_cap must be at least 1".into()));
        }

        if self.critical_odds == 0 || self.critical_multiplier < 1 {
            return Err(CombatError::Config(
                "critical_odds must be positive and critical_multiplier >= 1".into(),
            ));
        }

        if !(0..=1000).contains(&self.humanoid_attack_budget) {
            return Err(CombatError::Config(format!(
                "humanoid_attack_budget ({}) must be within 0..=1000",
                self.humanoid_attack_budget
            )));
        }

        if self.panic_decay < 0 || self.panic_when_hit < 0 || self.panic_on_miss < 0 {
            return Err(CombatError::Config("panic deltas must be non-negative".into()));
        }

        Ok(())
    }
}

// === GLOBAL CONFIG ACCESS ===

static CONFIG: OnceLock<CombatConfig> = OnceLock::new();

/// Get the global combat config (initializes with defaults if not set)
pub fn config() -> &'static CombatConfig {
    CONFIG.get_or_init(CombatConfig::default)
}

/// Set the global combat config (can only be called once)
///
/// Returns Err if config was already set.
pub fn set_config(config: CombatConfig) -> std::result::Result<(), CombatConfig> {
    CONFIG.set(config)
}
