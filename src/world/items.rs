//! Item arena: the only owner of equipment
//!
//! Sessions, engagements and inventories hold `ItemId` handles into this
//! store and borrow the item through the `Weapon`/`Armor` views.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::combat::armor::{Armor, ArmorPiece};
use crate::combat::equipment::Tool;
use crate::combat::weapons::{Launcher, MeleeWeapon, Projectile, Quiver, Weapon};
use crate::core::types::ItemId;

/// Every kind of item combat handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Melee(MeleeWeapon),
    Launcher(Launcher),
    Projectile(Projectile),
    Armor(ArmorPiece),
    Quiver(Quiver),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Item::Melee(w) => &w.name,
            Item::Launcher(l) => &l.name,
            Item::Projectile(p) => &p.name,
            Item::Armor(a) => &a.name,
            Item::Quiver(q) => &q.name,
        }
    }

    pub fn weapon(&self) -> Option<&dyn Weapon> {
        match self {
            Item::Melee(w) => Some(w),
            Item::Launcher(l) => Some(l),
            _ => None,
        }
    }

    pub fn armor(&self) -> Option<&dyn Armor> {
        match self {
            Item::Armor(a) => Some(a),
            _ => None,
        }
    }

    /// Slot-holding view, if the item can be wielded or worn
    pub fn tool(&self) -> Option<&dyn Tool> {
        match self {
            Item::Melee(w) => Some(w),
            Item::Launcher(l) => Some(l),
            Item::Armor(a) => Some(a),
            _ => None,
        }
    }

    pub fn launcher(&self) -> Option<&Launcher> {
        match self {
            Item::Launcher(l) => Some(l),
            _ => None,
        }
    }

    pub fn projectile(&self) -> Option<&Projectile> {
        match self {
            Item::Projectile(p) => Some(p),
            _ => None,
        }
    }
}

/// Storage for all items
#[derive(Debug, Default)]
pub struct ItemStore {
    items: AHashMap<ItemId, Item>,
    next_id: u32,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, returning its handle
    pub fn insert(&mut self, item: Item) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        self.items.remove(&id)
    }

    pub fn name(&self, id: ItemId) -> String {
        self.get(id)
            .map(|item| item.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Does the held item stop the bare attack of its slot?
    pub fn blocks_attack(&self, id: ItemId) -> bool {
        match self.get(id) {
            Some(item) => item.weapon().is_some() || item.tool().is_some_and(|t| t.blocks_attack()),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::weapons::ProjectileKind;

    #[test]
    fn test_insert_and_views() {
        let mut store = ItemStore::new();
        let sword = store.insert(Item::Melee(MeleeWeapon::sword()));
        let helm = store.insert(Item::Armor(ArmorPiece::helm()));
        let quiver = store.insert(Item::Quiver(Quiver::new(ProjectileKind::Arrow)));

        assert_ne!(sword, helm);
        assert!(store.get(sword).unwrap().weapon().is_some());
        assert!(store.get(helm).unwrap().armor().is_some());
        assert!(store.get(quiver).unwrap().tool().is_none());
        assert_eq!(store.name(sword), "longsword");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_blocks_attack() {
        let mut store = ItemStore::new();
        let shield = store.insert(Item::Armor(ArmorPiece::shield()));
        let helm = store.insert(Item::Armor(ArmorPiece::helm()));
        let club = store.insert(Item::Melee(MeleeWeapon::club()));
        assert!(store.blocks_attack(shield));
        assert!(!store.blocks_attack(helm));
        assert!(store.blocks_attack(club));
        assert!(!store.blocks_attack(ItemId(999)));
    }

    #[test]
    fn test_missing_item_name_falls_back_to_handle() {
        let store = ItemStore::new();
        assert_eq!(store.name(ItemId(4)), "#4");
    }
}
