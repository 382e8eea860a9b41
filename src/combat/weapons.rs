//! Weapon properties for numeric combat resolution
//!
//! Melee weapons have a to-hit class, three penetration values and the skill
//! that drives them. Launchers add a readiness delay and a projectile kind.

use serde::{Deserialize, Serialize};

use crate::combat::damage::{DamageType, Penetration};
use crate::combat::equipment::Tool;
use crate::combat::tool_slots::ToolSlot;
use crate::core::types::{ItemId, Tick};
use crate::entity::living::Skill;

/// Which hands a weapon needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hands {
    Right,
    Left,
    /// Right hand if free, otherwise left
    Any,
    Both,
}

impl Hands {
    /// Slot choices in order of preference
    pub fn candidates(self) -> &'static [ToolSlot] {
        match self {
            Hands::Right => &[ToolSlot::RIGHT_HAND],
            Hands::Left => &[ToolSlot::LEFT_HAND],
            Hands::Any => &[ToolSlot::RIGHT_HAND, ToolSlot::LEFT_HAND],
            Hands::Both => &[ToolSlot::BOTH_HANDS],
        }
    }
}

/// Anything that can be wielded to back an attack
pub trait Weapon: Tool {
    fn to_hit(&self) -> i32;
    fn penetration(&self) -> Penetration;
    fn damage_type(&self) -> DamageType;
    fn skill(&self) -> Skill;
    fn hands(&self) -> Hands;

    /// Launchers expose their ranged profile
    fn as_launcher(&self) -> Option<&Launcher> {
        None
    }
}

/// A hand-held melee weapon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeleeWeapon {
    pub name: String,
    pub to_hit: i32,
    pub penetration: Penetration,
    pub damage_type: DamageType,
    pub skill: Skill,
    pub hands: Hands,
}

impl MeleeWeapon {
    /// Common weapon: Sword
    pub fn sword() -> Self {
        Self {
            name: "longsword".into(),
            to_hit: 35,
            penetration: Penetration::new(30, 35, 15),
            damage_type: DamageType::IMPALE | DamageType::SLASH,
            skill: Skill::Sword,
            hands: Hands::Any,
        }
    }

    /// Common weapon: Axe
    pub fn axe() -> Self {
        Self {
            name: "battleaxe".into(),
            to_hit: 28,
            penetration: Penetration::new(10, 40, 25),
            damage_type: DamageType::SLASH,
            skill: Skill::Axe,
            hands: Hands::Any,
        }
    }

    /// Common weapon: Club
    pub fn club() -> Self {
        Self {
            name: "club".into(),
            to_hit: 25,
            penetration: Penetration::new(0, 0, 30),
            damage_type: DamageType::BLUDGEON,
            skill: Skill::Club,
            hands: Hands::Any,
        }
    }

    /// Common weapon: Knife
    pub fn knife() -> Self {
        Self {
            name: "knife".into(),
            to_hit: 30,
            penetration: Penetration::new(15, 10, 5),
            damage_type: DamageType::IMPALE | DamageType::SLASH,
            skill: Skill::Knife,
            hands: Hands::Any,
        }
    }

    /// Common weapon: Halberd (two-handed)
    pub fn halberd() -> Self {
        Self {
            name: "halberd".into(),
            to_hit: 30,
            penetration: Penetration::new(40, 45, 20),
            damage_type: DamageType::IMPALE | DamageType::SLASH,
            skill: Skill::Polearm,
            hands: Hands::Both,
        }
    }
}

impl Tool for MeleeWeapon {
    fn name(&self) -> &str {
        &self.name
    }

    fn slots(&self) -> ToolSlot {
        self.hands
            .candidates()
            .first()
            .copied()
            .unwrap_or(ToolSlot::RIGHT_HAND)
    }
}

impl Weapon for MeleeWeapon {
    fn to_hit(&self) -> i32 {
        self.to_hit
    }

    fn penetration(&self) -> Penetration {
        self.penetration
    }

    fn damage_type(&self) -> DamageType {
        self.damage_type
    }

    fn skill(&self) -> Skill {
        self.skill
    }

    fn hands(&self) -> Hands {
        self.hands
    }
}

/// Ammunition families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    Arrow,
    Bolt,
}

/// Bow or crossbow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launcher {
    pub name: String,
    pub to_hit: i32,
    /// Impale penetration of the launcher itself
    pub penetration: i32,
    pub ammunition: ProjectileKind,
    /// Ticks from loaded to ready before dexterity shortens it
    pub ready_delay: Tick,
    /// Must be held drawn while loaded (bows); crossbows hold themselves
    pub drawn: bool,
    /// Rooms away the launcher can still reach
    pub range: u32,
}

impl Launcher {
    pub fn shortbow() -> Self {
        Self {
            name: "shortbow".into(),
            to_hit: 30,
            penetration: 25,
            ammunition: ProjectileKind::Arrow,
            ready_delay: 3,
            drawn: true,
            range: 1,
        }
    }

    pub fn longbow() -> Self {
        Self {
            name: "longbow".into(),
            to_hit: 35,
            penetration: 35,
            ammunition: ProjectileKind::Arrow,
            ready_delay: 5,
            drawn: true,
            range: 2,
        }
    }

    pub fn light_crossbow() -> Self {
        Self {
            name: "light crossbow".into(),
            to_hit: 40,
            penetration: 40,
            ammunition: ProjectileKind::Bolt,
            ready_delay: 8,
            drawn: false,
            range: 2,
        }
    }
}

impl Tool for Launcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn slots(&self) -> ToolSlot {
        ToolSlot::BOTH_HANDS
    }
}

impl Weapon for Launcher {
    // Swung in melee a launcher is a poor club
    fn to_hit(&self) -> i32 {
        self.to_hit / 3
    }

    fn penetration(&self) -> Penetration {
        Penetration::new(0, 0, self.penetration / 4)
    }

    fn damage_type(&self) -> DamageType {
        DamageType::BLUDGEON
    }

    fn skill(&self) -> Skill {
        Skill::Missiles
    }

    fn hands(&self) -> Hands {
        Hands::Both
    }

    fn as_launcher(&self) -> Option<&Launcher> {
        Some(self)
    }
}

/// One arrow or bolt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    pub name: String,
    pub kind: ProjectileKind,
    pub to_hit: i32,
    pub penetration: i32,
    /// Percent chance to break when it strikes
    pub break_chance: i32,
}

impl Projectile {
    pub fn arrow() -> Self {
        Self {
            name: "arrow".into(),
            kind: ProjectileKind::Arrow,
            to_hit: 30,
            penetration: 30,
            break_chance: 30,
        }
    }

    /// Narrow armour-piercing head
    pub fn bodkin() -> Self {
        Self {
            name: "bodkin arrow".into(),
            kind: ProjectileKind::Arrow,
            to_hit: 25,
            penetration: 45,
            break_chance: 40,
        }
    }

    pub fn bolt() -> Self {
        Self {
            name: "bolt".into(),
            kind: ProjectileKind::Bolt,
            to_hit: 35,
            penetration: 40,
            break_chance: 20,
        }
    }
}

/// Container of projectiles worn or carried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiver {
    pub name: String,
    pub holds: ProjectileKind,
    pub contents: Vec<ItemId>,
}

impl Quiver {
    pub fn new(holds: ProjectileKind) -> Self {
        let name = match holds {
            ProjectileKind::Arrow => "quiver",
            ProjectileKind::Bolt => "bolt case",
        };
        Self {
            name: name.into(),
            holds,
            contents: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sword_properties() {
        let sword = MeleeWeapon::sword();
        assert_eq!(sword.skill, Skill::Sword);
        assert!(sword.damage_type.contains(DamageType::SLASH));
        assert_eq!(sword.slots(), ToolSlot::RIGHT_HAND);
    }

    #[test]
    fn test_club_is_blunt() {
        let club = MeleeWeapon::club();
        assert_eq!(club.damage_type, DamageType::BLUDGEON);
        assert_eq!(club.penetration.impale, 0);
    }

    #[test]
    fn test_two_handed_needs_both_hands() {
        assert_eq!(MeleeWeapon::halberd().slots(), ToolSlot::BOTH_HANDS);
        assert_eq!(Launcher::longbow().slots(), ToolSlot::BOTH_HANDS);
    }

    #[test]
    fn test_launcher_profile() {
        let bow = Launcher::shortbow();
        assert!(bow.as_launcher().is_some());
        assert!(bow.drawn);
        assert!(!Launcher::light_crossbow().drawn);
        assert!(MeleeWeapon::knife().as_launcher().is_none());
    }

    #[test]
    fn test_ammunition_matches() {
        assert_eq!(Launcher::longbow().ammunition, Projectile::arrow().kind);
        assert_eq!(Launcher::light_crossbow().ammunition, Projectile::bolt().kind);
    }
}
