//! Damage types, penetration columns and per-type armour class
//!
//! Physical attacks carry three penetration values (impale, slash,
//! bludgeon). Armour answers with the matching three armour classes.

use std::ops::{Add, Sub};

use bitflags::bitflags;
use rand::Rng;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Damage type bitmask. An attack may deal several physical types; one is
    /// picked per blow.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DamageType: u8 {
        const IMPALE = 0b0001;
        const SLASH = 0b0010;
        const BLUDGEON = 0b0100;
        /// Bypasses armour entirely
        const MAGIC = 0b1000;
    }
}

/// One of the three physical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Impale,
    Slash,
    Bludgeon,
}

impl Column {
    pub fn all() -> [Column; 3] {
        [Column::Impale, Column::Slash, Column::Bludgeon]
    }

    pub fn flag(self) -> DamageType {
        match self {
            Column::Impale => DamageType::IMPALE,
            Column::Slash => DamageType::SLASH,
            Column::Bludgeon => DamageType::BLUDGEON,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Column::Impale => "stab",
            Column::Slash => "slash",
            Column::Bludgeon => "bludgeon",
        }
    }
}

impl DamageType {
    /// Physical columns present in this mask
    pub fn columns(self) -> impl Iterator<Item = Column> {
        Column::all().into_iter().filter(move |c| self.contains(c.flag()))
    }

    /// Pick the column this blow is dealt with
    ///
    /// Returns None for a purely magical mask.
    pub fn pick_column<R: Rng + ?Sized>(self, rng: &mut R) -> Option<Column> {
        let columns: Vec<Column> = self.columns().collect();
        match columns.len() {
            0 => None,
            1 => Some(columns[0]),
            n => Some(columns[rng.gen_range(0..n)]),
        }
    }
}

/// Penetration per physical damage type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penetration {
    pub impale: i32,
    pub slash: i32,
    pub bludgeon: i32,
}

impl Penetration {
    pub fn new(impale: i32, slash: i32, bludgeon: i32) -> Self {
        Self {
            impale,
            slash,
            bludgeon,
        }
    }

    /// Same penetration for all three types
    pub fn uniform(value: i32) -> Self {
        Self::new(value, value, value)
    }

    pub fn get(&self, column: Column) -> i32 {
        match column {
            Column::Impale => self.impale,
            Column::Slash => self.slash,
            Column::Bludgeon => self.bludgeon,
        }
    }

    /// Apply `f` to each column
    pub fn map(self, f: impl Fn(i32) -> i32) -> Self {
        Self::new(f(self.impale), f(self.slash), f(self.bludgeon))
    }

    /// Mean of the columns present in `mask` (0 if none)
    pub fn mean_over(&self, mask: DamageType) -> i32 {
        let (sum, n) = mask
            .columns()
            .fold((0, 0), |(s, n), c| (s + self.get(c), n + 1));
        if n == 0 {
            0
        } else {
            sum / n
        }
    }
}

/// Armour class per physical damage type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmorClass {
    pub impale: i32,
    pub slash: i32,
    pub bludgeon: i32,
}

impl ArmorClass {
    pub fn new(impale: i32, slash: i32, bludgeon: i32) -> Self {
        Self {
            impale,
            slash,
            bludgeon,
        }
    }

    /// One scalar for all three types
    pub fn uniform(value: i32) -> Self {
        Self::new(value, value, value)
    }

    pub fn get(&self, column: Column) -> i32 {
        match column {
            Column::Impale => self.impale,
            Column::Slash => self.slash,
            Column::Bludgeon => self.bludgeon,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for ArmorClass {
    type Output = ArmorClass;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.impale + rhs.impale,
            self.slash + rhs.slash,
            self.bludgeon + rhs.bludgeon,
        )
    }
}

impl Sub for ArmorClass {
    type Output = ArmorClass;

    fn sub(self, rhs: Self) -> Self {
        Self::new(
            self.impale - rhs.impale,
            self.slash - rhs.slash,
            self.bludgeon - rhs.bludgeon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_pick_column_single_type() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(DamageType::SLASH.pick_column(&mut rng), Some(Column::Slash));
        }
    }

    #[test]
    fn test_pick_column_magic_only() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(DamageType::MAGIC.pick_column(&mut rng), None);
    }

    #[test]
    fn test_pick_column_mixed_stays_in_mask() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mask = DamageType::IMPALE | DamageType::BLUDGEON;
        for _ in 0..100 {
            let column = mask.pick_column(&mut rng).unwrap();
            assert_ne!(column, Column::Slash);
        }
    }

    #[test]
    fn test_mean_over_mask() {
        let pen = Penetration::new(10, 20, 30);
        assert_eq!(pen.mean_over(DamageType::IMPALE | DamageType::BLUDGEON), 20);
        assert_eq!(pen.mean_over(DamageType::MAGIC), 0);
    }

    #[test]
    fn test_armor_class_arithmetic() {
        let base = ArmorClass::uniform(5);
        let mail = ArmorClass::new(10, 15, 5);
        let worn = base + mail;
        assert_eq!(worn, ArmorClass::new(15, 20, 10));
        assert_eq!(worn - mail, base);
    }
}
