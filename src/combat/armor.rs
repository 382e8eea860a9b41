//! Armour pieces and the per-type armour class they add
//!
//! Material decides the armour class per damage type; a piece covers one or
//! more hit locations and holds the tool slots it is worn in.

use serde::{Deserialize, Serialize};

use crate::combat::damage::ArmorClass;
use crate::combat::equipment::Tool;
use crate::combat::hit_location::LocationId;
use crate::combat::tool_slots::ToolSlot;

/// What the piece is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    /// Clothing, robes
    Cloth,
    /// Cured hide, thick cloth
    Leather,
    /// Interlocking rings
    Mail,
    /// Solid metal
    Plate,
}

impl Material {
    /// Armour class per damage type
    ///
    /// Mail turns edges but not points; plate turns both; padding in
    /// leather soaks some impact.
    pub fn armor_class(self) -> ArmorClass {
        match self {
            Material::Cloth => ArmorClass::new(1, 2, 1),
            Material::Leather => ArmorClass::new(6, 8, 8),
            Material::Mail => ArmorClass::new(12, 22, 10),
            Material::Plate => ArmorClass::new(30, 35, 20),
        }
    }
}

/// Anything that can be worn to protect hit locations
pub trait Armor: Tool {
    fn armor_class(&self) -> ArmorClass;
    fn covers(&self) -> &[LocationId];
}

/// One worn piece
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmorPiece {
    pub name: String,
    pub material: Material,
    /// Overrides the material value, e.g. for enchanted pieces
    pub armor_class: Option<ArmorClass>,
    pub covers: Vec<LocationId>,
    pub slots: ToolSlot,
    /// Held pieces (shields) stop the hand behind them from striking
    pub blocks_attack: bool,
}

impl ArmorPiece {
    pub fn new(
        name: impl Into<String>,
        material: Material,
        covers: Vec<LocationId>,
        slots: ToolSlot,
    ) -> Self {
        Self {
            name: name.into(),
            material,
            armor_class: None,
            covers,
            slots,
            blocks_attack: false,
        }
    }

    /// Light armour (leather)
    pub fn leather_jerkin() -> Self {
        Self::new(
            "leather jerkin",
            Material::Leather,
            vec![LocationId::Body],
            ToolSlot::BODY,
        )
    }

    /// Medium armour (mail)
    pub fn chainmail() -> Self {
        Self::new(
            "chainmail",
            Material::Mail,
            vec![LocationId::Body, LocationId::Arms],
            ToolSlot::BODY | ToolSlot::ARMS,
        )
    }

    /// Heavy armour (plate)
    pub fn plate_harness() -> Self {
        Self::new(
            "plate harness",
            Material::Plate,
            vec![LocationId::Body, LocationId::Arms, LocationId::Legs],
            ToolSlot::BODY | ToolSlot::ARMS | ToolSlot::LEGS,
        )
    }

    pub fn helm() -> Self {
        Self::new("helm", Material::Plate, vec![LocationId::Head], ToolSlot::HEAD)
    }

    /// Held in the left hand; covers the arms
    pub fn shield() -> Self {
        Self {
            blocks_attack: true,
            ..Self::new(
                "shield",
                Material::Plate,
                vec![LocationId::Arms],
                ToolSlot::LEFT_HAND,
            )
        }
    }

    pub fn with_armor_class(mut self, ac: ArmorClass) -> Self {
        self.armor_class = Some(ac);
        self
    }
}

impl Tool for ArmorPiece {
    fn name(&self) -> &str {
        &self.name
    }

    fn slots(&self) -> ToolSlot {
        self.slots
    }

    fn blocks_attack(&self) -> bool {
        self.blocks_attack
    }
}

impl Armor for ArmorPiece {
    fn armor_class(&self) -> ArmorClass {
        self.armor_class
            .unwrap_or_else(|| self.material.armor_class())
    }

    fn covers(&self) -> &[LocationId] {
        &self.covers
    }
}
