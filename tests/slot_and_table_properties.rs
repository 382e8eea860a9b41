//! Property checks for the pure combat helpers

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use skirmish::combat::{
    normalize, resolve_hit, ArmorClass, DamageType, HitLocation, LocationId, Panic, Penetration,
    ToolSlot, ToolSlotRegistry,
};
use skirmish::core::types::ItemId;

fn slot_mask() -> impl Strategy<Value = ToolSlot> {
    any::<u32>().prop_map(ToolSlot::from_bits_truncate)
}

proptest! {
    #[test]
    fn normalize_stays_in_band(offense in 0i32..10_000, defense in 0i32..10_000) {
        let n = normalize(offense, defense);
        prop_assert!((-50..=50).contains(&n));
    }

    #[test]
    fn normalize_balanced_and_unopposed(x in 1i32..100_000) {
        prop_assert_eq!(normalize(x, x), 0);
        prop_assert_eq!(normalize(x, 0), 50);
        prop_assert_eq!(normalize(0, x), -50);
    }

    #[test]
    fn normalize_is_antisymmetric_enough(a in 1i32..1_000, b in 1i32..1_000) {
        let sum = normalize(a, b) + normalize(b, a);
        prop_assert!((-1..=1).contains(&sum));
    }

    #[test]
    fn occupy_then_release_restores_registry(first in slot_mask(), second in slot_mask()) {
        let mut registry = ToolSlotRegistry::new();
        registry.occupy(ItemId(1), first).unwrap();
        let before = registry.clone();

        match registry.occupy(ItemId(2), second) {
            Ok(()) => {
                prop_assert!(!first.intersects(second));
                let released = registry.release(ItemId(2));
                prop_assert_eq!(released, second);
                prop_assert_eq!(&registry, &before);
            }
            Err(conflict) => {
                prop_assert!(first.intersects(second));
                prop_assert_eq!(conflict.blocker, ItemId(1));
                prop_assert_eq!(&registry, &before);
            }
        }
    }

    #[test]
    fn double_release_is_a_no_op(slots in slot_mask()) {
        let mut registry = ToolSlotRegistry::new();
        registry.occupy(ItemId(3), slots).unwrap();
        registry.release(ItemId(3));
        let after_first = registry.clone();
        prop_assert_eq!(registry.release(ItemId(3)), ToolSlot::empty());
        prop_assert_eq!(&registry, &after_first);
        prop_assert!(registry.is_empty());
    }

    #[test]
    fn panic_never_goes_negative(deltas in prop::collection::vec(-50i32..50, 0..64)) {
        let mut panic = Panic::new();
        for delta in deltas {
            let level = panic.add(delta);
            prop_assert!(level >= 0);
            prop_assert_eq!(level, panic.level());
        }
    }

    #[test]
    fn damage_is_never_negative(
        pen in 0i32..500,
        ac in 0i32..500,
        seed in any::<u64>(),
        bits in 1u8..16,
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let location = HitLocation::new(LocationId::Body, ArmorClass::uniform(ac), 100, "body");
        let damage_type = DamageType::from_bits_truncate(bits);
        let blow = resolve_hit(&mut rng, Penetration::uniform(pen), damage_type, &location);
        prop_assert!(blow.damage >= 0);
    }
}

#[test]
fn second_item_gets_slot_after_first_releases() {
    let mut registry = ToolSlotRegistry::new();
    registry.occupy(ItemId(1), ToolSlot::HEAD).unwrap();
    let conflict = registry.occupy(ItemId(2), ToolSlot::HEAD).unwrap_err();
    assert_eq!(conflict.blocker, ItemId(1));

    registry.release(ItemId(1));
    registry.occupy(ItemId(2), ToolSlot::HEAD).unwrap();
    assert_eq!(registry.query(ToolSlot::HEAD), Some(ItemId(2)));
}

#[test]
fn more_penetration_means_more_damage_on_average() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let location = HitLocation::new(LocationId::Body, ArmorClass::uniform(20), 100, "body");
    let mean = |rng: &mut ChaCha8Rng, pen: i32| {
        let total: i64 = (0..4_000)
            .map(|_| {
                let pen = Penetration::uniform(pen);
                i64::from(resolve_hit(rng, pen, DamageType::SLASH, &location).damage)
            })
            .sum();
        total as f64 / 4_000.0
    };
    let mut previous = 0.0;
    for pen in [20, 40, 80, 160] {
        let m = mean(&mut rng, pen);
        assert!(m >= previous, "pen {pen}: {m} < {previous}");
        previous = m;
    }
    assert!(previous > 0.0);
}
