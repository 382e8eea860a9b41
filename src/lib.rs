//! Skirmish - round-based combat resolution for persistent text worlds

pub mod combat;
pub mod core;
pub mod entity;
pub mod simulation;
pub mod world;
