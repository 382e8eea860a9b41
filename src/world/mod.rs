//! Items and room topology consumed by combat

pub mod items;
pub mod surroundings;

pub use items::{Item, ItemStore};
pub use surroundings::{Exit, RoomGraph, Surroundings};
