//! Equipment seen by combat, and standard loadouts
//!
//! Combat never owns equipment. It sees weapons and armour through the
//! `Tool`, `Weapon` and `Armor` traits and keeps `ItemId` handles.

use serde::{Deserialize, Serialize};

use crate::combat::armor::ArmorPiece;
use crate::combat::tool_slots::ToolSlot;
use crate::combat::weapons::{Launcher, MeleeWeapon, Projectile};

/// Anything that occupies tool slots
pub trait Tool {
    fn name(&self) -> &str;
    fn slots(&self) -> ToolSlot;

    /// Stops the attack backed by the slot it occupies
    fn blocks_attack(&self) -> bool {
        false
    }
}

/// Standard kits handed out by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Loadout {
    Brawler,
    Swordsman,
    Axeman,
    Halberdier,
    Knight,
    Archer,
    Crossbowman,
}

/// What a loadout hands out
#[derive(Debug, Clone, Default)]
pub struct Kit {
    pub weapons: Vec<MeleeWeapon>,
    pub launcher: Option<Launcher>,
    pub projectiles: Vec<Projectile>,
    pub armor: Vec<ArmorPiece>,
}

impl Loadout {
    pub fn parse(name: &str) -> Option<Loadout> {
        match name.to_ascii_lowercase().as_str() {
            "brawler" | "none" => Some(Loadout::Brawler),
            "swordsman" | "sword" => Some(Loadout::Swordsman),
            "axeman" | "axe" => Some(Loadout::Axeman),
            "halberdier" | "halberd" => Some(Loadout::Halberdier),
            "knight" => Some(Loadout::Knight),
            "archer" | "bow" => Some(Loadout::Archer),
            "crossbowman" | "crossbow" => Some(Loadout::Crossbowman),
            _ => None,
        }
    }

    pub fn kit(self) -> Kit {
        match self {
            Loadout::Brawler => Kit::default(),
            Loadout::Swordsman => Kit {
                weapons: vec![MeleeWeapon::sword()],
                armor: vec![ArmorPiece::leather_jerkin()],
                ..Kit::default()
            },
            Loadout::Axeman => Kit {
                weapons: vec![MeleeWeapon::axe()],
                armor: vec![ArmorPiece::leather_jerkin(), ArmorPiece::shield()],
                ..Kit::default()
            },
            Loadout::Halberdier => Kit {
                weapons: vec![MeleeWeapon::halberd()],
                armor: vec![ArmorPiece::chainmail(), ArmorPiece::helm()],
                ..Kit::default()
            },
            Loadout::Knight => Kit {
                weapons: vec![MeleeWeapon::sword()],
                armor: vec![
                    ArmorPiece::plate_harness(),
                    ArmorPiece::helm(),
                    ArmorPiece::shield(),
                ],
                ..Kit::default()
            },
            Loadout::Archer => Kit {
                launcher: Some(Launcher::longbow()),
                projectiles: vec![Projectile::arrow(); 12],
                armor: vec![ArmorPiece::leather_jerkin()],
                ..Kit::default()
            },
            Loadout::Crossbowman => Kit {
                launcher: Some(Launcher::light_crossbow()),
                projectiles: vec![Projectile::bolt(); 10],
                armor: vec![ArmorPiece::chainmail()],
                ..Kit::default()
            },
        }
    }
}
