use thiserror::Error;

use crate::core::types::{EngagementId, EntityId, ItemId};

#[derive(Error, Debug)]
pub enum CombatError {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("No combat session for entity {0}")]
    SessionNotFound(EntityId),

    #[error("{0} is not a weapon")]
    NotAWeapon(String),

    #[error("{0} is not armour")]
    NotArmor(String),

    #[error("You cannot use the {item} while wielding or wearing the {blocker}.")]
    SlotOccupied { item: String, blocker: String },

    #[error("You are not wielding the {0}.")]
    NotWielded(String),

    #[error("You are not wearing the {0}.")]
    NotWorn(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("The {0} is out of range.")]
    OutOfRange(String),

    #[error("You have nothing to load the {0} with.")]
    NoProjectile(String),

    #[error("The {0} is not ready to fire.")]
    NotReady(String),

    #[error("No such ranged engagement: {0:?}")]
    EngagementNotFound(EngagementId),

    #[error("Table is full ({0} entries)")]
    TableFull(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CombatError>;
