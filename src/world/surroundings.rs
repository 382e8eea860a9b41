//! Room topology as seen by combat
//!
//! The world owns rooms and exits. Combat asks where an entity can flee,
//! whether another room is in sight, whether a room is dark, and hands
//! spent projectiles back to the floor.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::types::{ItemId, RoomId};

/// One way out of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub direction: String,
    pub to: RoomId,
}

/// What combat needs from the world
pub trait Surroundings {
    fn exits(&self, room: RoomId) -> Vec<Exit>;

    /// Rooms between `from` and `to` if `to` is visible, 0 for the same room
    fn line_of_sight(&self, from: RoomId, to: RoomId) -> Option<u32>;

    fn is_dark(&self, _room: RoomId) -> bool {
        false
    }

    /// A projectile came to rest in `room`
    fn drop_item(&mut self, room: RoomId, item: ItemId);
}

/// Longest straight line of rooms that stays in sight
pub const SIGHT_DEPTH: u32 = 3;

/// In-memory room graph
///
/// Line of sight follows a chain of exits that all share one direction,
/// up to `SIGHT_DEPTH` rooms away.
#[derive(Debug, Clone, Default)]
pub struct RoomGraph {
    exits: AHashMap<RoomId, Vec<Exit>>,
    dark: AHashSet<RoomId>,
    floor: AHashMap<RoomId, Vec<ItemId>>,
}

impl RoomGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-way exit
    pub fn add_exit(&mut self, from: RoomId, direction: impl Into<String>, to: RoomId) {
        self.exits.entry(from).or_default().push(Exit {
            direction: direction.into(),
            to,
        });
    }

    /// Exits both ways with opposite direction names
    pub fn connect(&mut self, a: RoomId, direction: &str, b: RoomId) {
        self.add_exit(a, direction, b);
        self.add_exit(b, opposite(direction), a);
    }

    pub fn set_dark(&mut self, room: RoomId, dark: bool) {
        if dark {
            self.dark.insert(room);
        } else {
            self.dark.remove(&room);
        }
    }

    /// Items lying in a room
    pub fn floor(&self, room: RoomId) -> &[ItemId] {
        self.floor.get(&room).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn opposite(direction: &str) -> &str {
    match direction {
        "north" => "south",
        "south" => "north",
        "east" => "west",
        "west" => "east",
        "up" => "down",
        "down" => "up",
        "northeast" => "southwest",
        "southwest" => "northeast",
        "northwest" => "southeast",
        "southeast" => "northwest",
        other => other,
    }
}

impl Surroundings for RoomGraph {
    fn exits(&self, room: RoomId) -> Vec<Exit> {
        self.exits.get(&room).cloned().unwrap_or_default()
    }

    fn line_of_sight(&self, from: RoomId, to: RoomId) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        for exit in self.exits.get(&from).into_iter().flatten() {
            let mut room = exit.to;
            let mut distance = 1;
            loop {
                if room == to {
                    return Some(distance);
                }
                if distance >= SIGHT_DEPTH {
                    break;
                }
                let next = self
                    .exits
                    .get(&room)
                    .and_then(|exits| exits.iter().find(|e| e.direction == exit.direction));
                match next {
                    Some(e) => {
                        room = e.to;
                        distance += 1;
                    }
                    None => break,
                }
            }
        }
        None
    }

    fn is_dark(&self, room: RoomId) -> bool {
        self.dark.contains(&room)
    }

    fn drop_item(&mut self, room: RoomId, item: ItemId) {
        self.floor.entry(room).or_default().push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> RoomGraph {
        let mut graph = RoomGraph::new();
        graph.connect(RoomId(0), "east", RoomId(1));
        graph.connect(RoomId(1), "east", RoomId(2));
        graph.connect(RoomId(2), "east", RoomId(3));
        graph.connect(RoomId(3), "east", RoomId(4));
        graph.connect(RoomId(1), "north", RoomId(10));
        graph
    }

    #[test]
    fn test_line_of_sight_along_corridor() {
        let graph = corridor();
        assert_eq!(graph.line_of_sight(RoomId(0), RoomId(0)), Some(0));
        assert_eq!(graph.line_of_sight(RoomId(0), RoomId(2)), Some(2));
        assert_eq!(graph.line_of_sight(RoomId(4), RoomId(1)), Some(3));
    }

    #[test]
    fn test_no_sight_round_corners_or_too_far() {
        let graph = corridor();
        assert_eq!(graph.line_of_sight(RoomId(0), RoomId(10)), None);
        assert_eq!(graph.line_of_sight(RoomId(0), RoomId(4)), None);
    }

    #[test]
    fn test_connect_adds_both_ways() {
        let graph = corridor();
        let back = graph.exits(RoomId(1));
        assert!(back.iter().any(|e| e.direction == "west" && e.to == RoomId(0)));
        assert!(graph.exits(RoomId(99)).is_empty());
    }

    #[test]
    fn test_drop_item_and_darkness() {
        let mut graph = corridor();
        graph.drop_item(RoomId(2), ItemId(9));
        assert_eq!(graph.floor(RoomId(2)), &[ItemId(9)]);
        graph.set_dark(RoomId(2), true);
        assert!(graph.is_dark(RoomId(2)));
        assert!(!graph.is_dark(RoomId(1)));
    }
}
