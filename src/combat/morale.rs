//! Panic and morale
//!
//! Panic accumulates from misses and blows received and is shed by landing
//! blows or by time away from melee. It never drops below zero. Each round
//! a random draw against the panic level is compared with a threshold set
//! by discipline; beating it means the entity breaks and flees.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::CombatConfig;

/// What moved the panic level (symmetric: what one side suffers the other inflicts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanicSource {
    /// Attacker landed a blow
    HitLanded,
    /// Attacker missed
    Missed,
    /// Defender took a blow
    BlowReceived,
    /// A round passed without an exchange
    Respite,
}

impl PanicSource {
    /// Signed panic delta for this source under `config`
    pub fn delta(self, config: &CombatConfig) -> i32 {
        match self {
            PanicSource::HitLanded => -config.panic_on_hit,
            PanicSource::Missed => config.panic_on_miss,
            PanicSource::BlowReceived => config.panic_when_hit,
            PanicSource::Respite => -config.panic_decay,
        }
    }
}

/// Morale check result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakResult {
    /// Holding steady
    Holding,
    /// Panic above the threshold but the draw held
    Shaken,
    /// Breaking - will flee
    Breaking,
}

/// Panic level of one combatant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panic {
    level: i32,
}

impl Panic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Add a signed delta; the level floors at zero
    pub fn add(&mut self, delta: i32) -> i32 {
        self.level = self.level.saturating_add(delta).max(0);
        self.level
    }

    pub fn apply(&mut self, source: PanicSource, config: &CombatConfig) -> i32 {
        self.add(source.delta(config))
    }

    /// Shed panic while not exchanging blows
    pub fn decay(&mut self, config: &CombatConfig) {
        self.apply(PanicSource::Respite, config);
    }

    pub fn clear(&mut self) {
        self.level = 0;
    }

    /// Morale threshold for an entity with `discipline`
    pub fn threshold(discipline: i32, config: &CombatConfig) -> i32 {
        config.panic_threshold_base + discipline.max(0) * config.discipline_factor
    }

    /// Roll morale: a draw in `0..=level` above the threshold breaks
    pub fn check<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        discipline: i32,
        config: &CombatConfig,
    ) -> BreakResult {
        if self.level == 0 {
            return BreakResult::Holding;
        }

        let threshold = Self::threshold(discipline, config);
        let draw = rng.gen_range(0..=self.level);
        if draw > threshold {
            BreakResult::Breaking
        } else if self.level > threshold {
            BreakResult::Shaken
        } else {
            BreakResult::Holding
        }
    }

    /// Share of this panic passed to a teammate when fleeing
    pub fn contagion(&self, config: &CombatConfig) -> i32 {
        self.level * config.panic_contagion_percent.max(0) / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_panic_never_negative() {
        let mut panic = Panic::new();
        panic.add(-50);
        assert_eq!(panic.level(), 0);
        panic.add(4);
        panic.add(-3);
        assert_eq!(panic.level(), 1);
    }

    #[test]
    fn test_sources_move_panic_the_right_way() {
        let config = CombatConfig::default();
        assert!(PanicSource::HitLanded.delta(&config) < 0);
        assert!(PanicSource::Missed.delta(&config) > 0);
        assert!(PanicSource::BlowReceived.delta(&config) > 0);
        assert!(PanicSource::Respite.delta(&config) < 0);
    }

    #[test]
    fn test_calm_entity_holds() {
        let config = CombatConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(Panic::new().check(&mut rng, 0, &config), BreakResult::Holding);
    }

    #[test]
    fn test_high_panic_breaks_undisciplined() {
        let config = CombatConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut panic = Panic::new();
        panic.add(1000);
        let breaks = (0..100)
            .filter(|_| panic.check(&mut rng, 0, &config) == BreakResult::Breaking)
            .count();
        assert!(breaks > 90);
    }

    #[test]
    fn test_discipline_raises_threshold() {
        let config = CombatConfig::default();
        assert!(Panic::threshold(20, &config) > Panic::threshold(5, &config));

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut panic = Panic::new();
        panic.add(30);
        // 30 panic never beats a threshold of 10 + 20 * 3
        for _ in 0..100 {
            assert_eq!(panic.check(&mut rng, 20, &config), BreakResult::Holding);
        }
    }

    #[test]
    fn test_contagion_share() {
        let config = CombatConfig::default();
        let mut panic = Panic::new();
        panic.add(50);
        assert_eq!(panic.contagion(&config), 10);
    }
}
