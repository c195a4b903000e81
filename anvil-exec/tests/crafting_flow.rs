//! End-to-end crafting flows over the seeded in-memory forge.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anvil_domain::{
    CombineRecipe, DecomposeRecipe, Inventory, Platform, QualityLevel, RecipeOutput, Slot,
    UserIdentity,
};
use anvil_engine::{RandomSource, SequenceRandom};
use anvil_exec::{
    CraftError, CraftingConfig, CraftingService, ErrorPhase, LockReason, StubLevels, StubNaming,
};
use anvil_store::{CraftingRepository, FailPoint, MemoryStore, StoreError};
use anvil_testkit::{catalog::*, Forge};
use rust_decimal_macros::dec;

fn quiet_rng() -> Arc<dyn RandomSource> {
    Arc::new(SequenceRandom::constant(0.99))
}

fn service(forge: &Forge) -> CraftingService<MemoryStore> {
    CraftingService::new(forge.store.clone(), CraftingConfig::default()).with_random(quiet_rng())
}

// =============================================================================
// Combine / decompose
// =============================================================================

#[tokio::test]
async fn test_combine_crafts_what_is_affordable() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 2)]);

    let outcome = service(&forge).combine(&forge.identity, "plank", 5).await.unwrap();

    assert_eq!(outcome.quantity_crafted, 2);
    assert_eq!(outcome.quantity_produced, 2);
    assert_eq!(forge.totals(), BTreeMap::from([(PLANK, 2)]));
}

#[tokio::test]
async fn test_decompose_perfect_salvage_on_zero_roll() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(PLANK, 1)]);
    let service = CraftingService::new(forge.store.clone(), CraftingConfig::default())
        .with_random(Arc::new(SequenceRandom::constant(0.0)));

    let outcome = service.decompose(&forge.identity, "plank", 1).await.unwrap();

    assert!(outcome.bonus_triggered);
    assert_eq!(outcome.bonus_count, 1);
    assert_eq!(outcome.multiplier, dec!(1.5));
    assert_eq!(outcome.outputs, BTreeMap::from([("wood".to_string(), 2)]));
    assert_eq!(forge.totals(), BTreeMap::from([(WOOD, 2)]));
}

#[tokio::test]
async fn test_decompose_multiple_outputs() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_SWORD, 3)]);

    let outcome = service(&forge).decompose(&forge.identity, "iron_sword", 2).await.unwrap();

    assert_eq!(outcome.quantity_processed, 2);
    assert_eq!(outcome.quantity_consumed, 2);
    assert_eq!(
        outcome.outputs,
        BTreeMap::from([("iron_ingot".to_string(), 4), ("plank".to_string(), 2)])
    );
    assert_eq!(
        forge.totals(),
        BTreeMap::from([(IRON_SWORD, 1), (IRON_INGOT, 4), (PLANK, 2)])
    );
}

#[tokio::test]
async fn test_round_trip_conserves_inventory() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_INGOT, 4), (PLANK, 2)]);
    let before = forge.totals();
    let service = service(&forge);

    let crafted = service.combine(&forge.identity, "iron_sword", 2).await.unwrap();
    assert_eq!(crafted.quantity_crafted, 2);
    assert_eq!(forge.totals(), BTreeMap::from([(IRON_SWORD, 2)]));

    service.decompose(&forge.identity, "iron_sword", 2).await.unwrap();
    assert_eq!(forge.totals(), before);
}

#[tokio::test]
async fn test_stepped_rolls_count_exactly() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 10)]);
    let service = CraftingService::new(forge.store.clone(), CraftingConfig::default())
        .with_random(Arc::new(SequenceRandom::stepped(10, 0.99)));

    let outcome = service.combine(&forge.identity, "plank", 10).await.unwrap();

    // Only the 0.0 roll is below the 0.10 base chance
    assert_eq!(outcome.bonus_count, 1);
    assert_eq!(outcome.quantity_produced, 11);
    assert_eq!(outcome.bonus_quantity, 1);
}

#[tokio::test]
async fn test_quality_follows_consumed_inputs() {
    let forge = Forge::seed().unwrap();
    forge.stock_with_quality(&[
        (WOOD, 1, QualityLevel::Legendary),
        (WOOD, 1, QualityLevel::Cursed),
    ]);

    let outcome = service(&forge).combine(&forge.identity, "plank", 1).await.unwrap();

    // Lowest tier is spent first
    assert_eq!(outcome.quality, QualityLevel::Cursed);
    let inventory = forge.inventory();
    assert_eq!(inventory.quantity_of(WOOD, QualityLevel::Legendary), 1);
    assert_eq!(inventory.quantity_of(PLANK, QualityLevel::Cursed), 1);
}

#[tokio::test]
async fn test_quality_averages_across_tiers() {
    let forge = Forge::seed().unwrap();
    forge.stock_with_quality(&[
        (WOOD, 1, QualityLevel::Legendary),
        (WOOD, 1, QualityLevel::Cursed),
    ]);

    let outcome = service(&forge).combine(&forge.identity, "plank", 2).await.unwrap();

    // (0 + 7) / 2 rounds half up to 4
    assert_eq!(outcome.quality, QualityLevel::from_ordinal(4));
    assert_eq!(forge.inventory().quantity_of(PLANK, QualityLevel::from_ordinal(4)), 2);
}

#[tokio::test]
async fn test_quality_averages_jointly_over_cost_lines() {
    let forge = Forge::seed().unwrap();
    forge.stock_with_quality(&[
        (IRON_INGOT, 2, QualityLevel::Legendary),
        (PLANK, 1, QualityLevel::Cursed),
    ]);

    let outcome = service(&forge).combine(&forge.identity, "iron_sword", 1).await.unwrap();

    // (7 * 2 + 0 * 1) / 3 = 4.67 rounds to 5, one tier for the whole craft
    assert_eq!(outcome.quality, QualityLevel::Rare);
    let inventory = forge.inventory();
    assert_eq!(inventory.quantity_of(IRON_SWORD, QualityLevel::Rare), 1);
    assert_eq!(inventory.slots().len(), 1);
}

#[tokio::test]
async fn test_decompose_outputs_keep_source_quality() {
    let forge = Forge::seed().unwrap();
    forge.stock_with_quality(&[
        (PLANK, 2, QualityLevel::Epic),
        (WOOD, 3, QualityLevel::Epic),
        (WOOD, 4, QualityLevel::Common),
    ]);

    let outcome = service(&forge).decompose(&forge.identity, "plank", 2).await.unwrap();

    assert_eq!(outcome.quality, QualityLevel::Epic);
    let inventory = forge.inventory();
    assert_eq!(inventory.quantity_of(WOOD, QualityLevel::Epic), 5);
    assert_eq!(inventory.quantity_of(WOOD, QualityLevel::Common), 4);
    assert_eq!(inventory.total_quantity(PLANK), 0);
    assert_eq!(inventory.slots().len(), 2);
}

#[tokio::test]
async fn test_public_names_resolve_through_naming() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 1)]);
    let service = service(&forge).with_naming(Arc::new(StubNaming::new().with_alias("Plank", "plank")));

    let outcome = service.combine(&forge.identity, "  Plank ", 1).await.unwrap();

    assert_eq!(outcome.item_name, "Plank");
    assert_eq!(forge.totals(), BTreeMap::from([(PLANK, 1)]));
}

// =============================================================================
// Gating
// =============================================================================

#[tokio::test]
async fn test_locked_recipes_are_rejected() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_INGOT, 2), (STEEL, 1)]);
    let service = service(&forge);

    let err = service.combine(&forge.identity, "steel", 1).await.unwrap_err();
    assert!(matches!(err, CraftError::RecipeLocked { reason: LockReason::NotUnlocked, .. }));

    let err = service.decompose(&forge.identity, "steel", 1).await.unwrap_err();
    assert!(matches!(err, CraftError::RecipeLocked { reason: LockReason::NotUnlocked, .. }));

    assert_eq!(forge.totals(), BTreeMap::from([(IRON_INGOT, 2), (STEEL, 1)]));
    assert_eq!(forge.store.transaction_count(), 0);
}

#[tokio::test]
async fn test_level_requirement() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_INGOT, 2), (PLANK, 1)]);
    let levels = Arc::new(StubLevels::new());
    let service = service(&forge).with_levels(levels.clone());

    levels.set_level(forge.user.id, SWORD_LEVEL - 2);
    let err = service.combine(&forge.identity, "iron_sword", 1).await.unwrap_err();
    assert!(matches!(
        err,
        CraftError::RecipeLocked { reason: LockReason::LevelTooLow { required: 5, actual: 3 }, .. }
    ));

    levels.set_fail_next(true);
    let err = service.combine(&forge.identity, "iron_sword", 1).await.unwrap_err();
    assert!(matches!(err, CraftError::RecipeLocked { reason: LockReason::LevelUnverified(_), .. }));

    levels.set_level(forge.user.id, SWORD_LEVEL);
    let outcome = service.combine(&forge.identity, "iron_sword", 1).await.unwrap();
    assert_eq!(outcome.quantity_crafted, 1);
}

#[tokio::test]
async fn test_level_check_skipped_without_provider() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_INGOT, 2), (PLANK, 1)]);

    let outcome = service(&forge).combine(&forge.identity, "iron_sword", 1).await.unwrap();
    assert_eq!(outcome.quantity_crafted, 1);
}

#[tokio::test]
async fn test_input_errors_change_nothing() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 3)]);
    let before = forge.inventory();
    let service = service(&forge);
    let stranger = UserIdentity::new("twitch", "nobody", "x");
    let shouting = UserIdentity::new("Twitch", "12345", "alice");

    let cases: Vec<(Result<_, CraftError>, &str)> = vec![
        (service.combine(&forge.identity, "plank", 0).await.map(|_| ()), "invalid_quantity"),
        (
            service.combine(&shouting, "plank", 1).await.map(|_| ()),
            "invalid_platform",
        ),
        (service.combine(&forge.identity, "   ", 1).await.map(|_| ()), "invalid_input"),
        (service.combine(&forge.identity, "unobtainium", 1).await.map(|_| ()), "item_not_found"),
        (service.combine(&stranger, "plank", 1).await.map(|_| ()), "user_not_found"),
        (service.combine(&forge.identity, "gem", 1).await.map(|_| ()), "recipe_not_found"),
        (service.decompose(&forge.identity, "gem", 1).await.map(|_| ()), "recipe_not_found"),
        (service.decompose(&forge.identity, "plank", 1).await.map(|_| ()), "insufficient_quantity"),
    ];

    for (result, kind) in cases {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), kind, "unexpected error {:?}", err);
    }
    assert_eq!(forge.inventory(), before);
    assert_eq!(forge.store.commit_count(), 0);
}

#[tokio::test]
async fn test_costless_combine_recipe_is_refused() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_INGOT, 1)]);
    forge.store.insert_combine_recipe(CombineRecipe {
        id: SAW_PLANK,
        target_item_id: PLANK,
        costs: vec![],
        required_level: None,
        key: "saw_plank".to_string(),
    });

    let err = service(&forge).combine(&forge.identity, "plank", 500).await.unwrap_err();

    assert_eq!(err.kind(), "invalid_input");
    assert_eq!(err.phase(), ErrorPhase::NothingHappened);
    assert_eq!(forge.totals(), BTreeMap::from([(IRON_INGOT, 1)]));
    assert_eq!(forge.store.transaction_count(), 0);
}

#[tokio::test]
async fn test_malformed_decompose_recipes_are_refused() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(PLANK, 1)]);
    let service = service(&forge);

    let zero_consumed = DecomposeRecipe {
        id: SPLIT_PLANK,
        source_item_id: PLANK,
        quantity_consumed_per_unit: 0,
        outputs: vec![RecipeOutput { item_id: WOOD, quantity: 1 }],
        key: "split_plank".to_string(),
    };
    let no_outputs = DecomposeRecipe {
        quantity_consumed_per_unit: 1,
        outputs: vec![],
        ..zero_consumed.clone()
    };

    for recipe in [zero_consumed, no_outputs] {
        forge.store.insert_decompose_recipe(recipe);
        let err = service.decompose(&forge.identity, "plank", 1000).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input", "unexpected error {:?}", err);
    }

    assert_eq!(forge.totals(), BTreeMap::from([(PLANK, 1)]));
    assert_eq!(forge.store.commit_count(), 0);
}

#[tokio::test]
async fn test_other_users_are_isolated() {
    let forge = Forge::seed().unwrap();
    let (bob, bob_identity) = forge.add_user(Platform::Discord, "d-99", "bob");
    forge.store.unlock(bob.id, SAW_PLANK);
    forge
        .store
        .set_inventory(bob.id, Inventory::from_slots(vec![Slot::new(WOOD, 4, QualityLevel::Common)]));
    forge.stock(&[(WOOD, 1)]);

    service(&forge).combine(&bob_identity, "plank", 4).await.unwrap();

    assert_eq!(forge.store.inventory(bob.id).total_quantity(PLANK), 4);
    assert_eq!(forge.totals(), BTreeMap::from([(WOOD, 1)]));
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_commit_failure_leaves_no_partial_write() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(IRON_INGOT, 4), (PLANK, 2)]);
    let before = forge.inventory();
    forge.store.fail_next(FailPoint::Commit);

    let err = service(&forge).combine(&forge.identity, "iron_sword", 2).await.unwrap_err();

    assert_eq!(err.phase(), ErrorPhase::OutcomeUnknown);
    assert_eq!(forge.inventory(), before);
    assert_eq!(forge.store.tracked_locks(), 0);
}

#[tokio::test]
async fn test_lock_timeout_surfaces_as_read_failure() {
    let forge = Forge::seed_into(MemoryStore::with_lock_timeout(Duration::from_millis(50))).unwrap();
    forge.stock(&[(WOOD, 1)]);

    let mut holder = forge.store.begin_transaction().await.unwrap();
    holder.read_inventory_locked(forge.user.id).await.unwrap();

    let err = service(&forge).combine(&forge.identity, "plank", 1).await.unwrap_err();
    assert!(matches!(err, CraftError::TransactionReadFailed(StoreError::LockTimeout { .. })));
    assert_eq!(err.phase(), ErrorPhase::RolledBack);

    holder.rollback().await.unwrap();
    let outcome = service(&forge).combine(&forge.identity, "plank", 1).await.unwrap();
    assert_eq!(outcome.quantity_crafted, 1);
}

#[tokio::test]
async fn test_abandoned_request_releases_lock() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 3)]);
    let before = forge.inventory();
    let service = service(&forge);

    let mut holder = forge.store.begin_transaction().await.unwrap();
    holder.read_inventory_locked(forge.user.id).await.unwrap();

    // The caller gives up while the request waits on the user lock
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), service.combine(&forge.identity, "plank", 2))
            .await;
    assert!(abandoned.is_err());

    holder.rollback().await.unwrap();
    assert_eq!(forge.store.tracked_locks(), 0);
    assert_eq!(forge.inventory(), before);
    assert_eq!(forge.store.commit_count(), 0);
    assert_eq!(forge.store.rollback_count(), 2);

    let outcome = service.combine(&forge.identity, "plank", 2).await.unwrap();
    assert_eq!(outcome.quantity_crafted, 2);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_recipe_queries() {
    let forge = Forge::seed().unwrap();
    let service = service(&forge);

    let info = service.get_recipe("iron_sword", Some(&forge.identity)).await.unwrap();
    assert_eq!(info.item_name, "iron_sword");
    assert_eq!(info.costs.len(), 2);
    assert_eq!(info.locked, Some(false));

    let info = service.get_recipe("steel", Some(&forge.identity)).await.unwrap();
    assert_eq!(info.locked, Some(true));

    let unlocked: Vec<_> = service
        .get_unlocked_recipes(&forge.identity)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.item_name)
        .collect();
    assert_eq!(unlocked, vec!["plank".to_string(), "iron_sword".to_string()]);

    let all = service.get_all_recipes().await.unwrap();
    assert_eq!(all.len(), 3);
    let sword = all.iter().find(|r| r.item_id == IRON_SWORD).unwrap();
    assert_eq!(sword.required_level, Some(SWORD_LEVEL));
    assert_eq!(sword.description, "A sturdy blade");

    assert!(matches!(
        service.get_recipe("gem", None).await,
        Err(CraftError::RecipeNotFound(_))
    ));
}

#[tokio::test]
async fn test_store_lookup_failure_is_reported() {
    let forge = Forge::seed().unwrap();
    forge.store.fail_next(FailPoint::Lookup);

    let err = service(&forge).get_all_recipes().await.unwrap_err();
    assert!(matches!(err, CraftError::Lookup(_)));
    assert_eq!(err.phase(), ErrorPhase::NothingHappened);

    // Injected failures are one-shot
    assert!(forge.store.get_all_recipes().await.is_ok());
}
