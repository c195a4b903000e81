//! Post-commit event delivery through the bus and dead letter.

use std::sync::Arc;
use std::time::Duration;

use anvil_domain::{CraftingEvent, EVENT_SCHEMA_VERSION, EVENT_SOURCE};
use anvil_engine::SequenceRandom;
use anvil_exec::{
    BroadcastBus, CraftingConfig, CraftingService, JsonlDeadLetterFile, MemoryDeadLetter,
    RecordingPublisher, ResilientPublisher, RetryPolicy, ShutdownError,
};
use anvil_store::FailPoint;
use anvil_testkit::{catalog::*, Forge};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn test_subscribers_receive_committed_events() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 2)]);

    let bus = Arc::new(BroadcastBus::new(16));
    let mut receiver = bus.subscribe();
    let dead_letter = Arc::new(MemoryDeadLetter::new());
    let publisher = ResilientPublisher::new(bus.clone(), fast_policy(), dead_letter.clone());

    let service = CraftingService::new(forge.store.clone(), CraftingConfig::default())
        .with_publisher(Arc::new(publisher))
        .with_random(Arc::new(SequenceRandom::constant(0.0)));

    service.combine(&forge.identity, "plank", 2).await.unwrap();
    service.shutdown(Duration::from_secs(1)).await.unwrap();

    let envelope = receiver.recv().await.unwrap().unwrap();
    assert_eq!(envelope.schema_version, EVENT_SCHEMA_VERSION);
    assert_eq!(envelope.source, EVENT_SOURCE);
    match envelope.event {
        CraftingEvent::ItemCombined {
            user_id,
            quantity,
            recipe_key,
            is_masterwork,
            masterwork_count,
            bonus_quantity,
            ..
        } => {
            assert_eq!(user_id, forge.user.id);
            assert_eq!(quantity, 2);
            assert_eq!(recipe_key, "saw_plank");
            assert!(is_masterwork);
            assert_eq!(masterwork_count, 2);
            assert_eq!(bonus_quantity, 2);
        },
        other => panic!("unexpected event {:?}", other),
    }
    assert!(dead_letter.records().is_empty());
}

#[tokio::test]
async fn test_undeliverable_events_are_dead_lettered() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(PLANK, 1)]);

    // No subscribers: every publish fails
    let bus = Arc::new(BroadcastBus::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dead_letter.jsonl");
    let sink = Arc::new(JsonlDeadLetterFile::new(&path));
    let publisher = ResilientPublisher::new(bus, fast_policy(), sink);

    let service = CraftingService::new(forge.store.clone(), CraftingConfig::without_bonuses())
        .with_publisher(Arc::new(publisher));

    let outcome = service.decompose(&forge.identity, "plank", 1).await.unwrap();
    assert!(!outcome.bonus_triggered);
    service.shutdown(Duration::from_secs(2)).await.unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["event"]["event"]["type"], "item_decomposed");
    assert_eq!(record["event"]["event"]["recipe_key"], "split_plank");
    assert!(record["error"].as_str().unwrap().contains("no active subscribers"));
}

#[tokio::test]
async fn test_one_event_per_success_none_on_failure() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 3)]);
    let publisher = Arc::new(RecordingPublisher::new());
    let service = CraftingService::new(forge.store.clone(), CraftingConfig::without_bonuses())
        .with_publisher(publisher.clone());

    service.combine(&forge.identity, "plank", 1).await.unwrap();
    forge.store.fail_next(FailPoint::Commit);
    service.combine(&forge.identity, "plank", 1).await.unwrap_err();
    service.decompose(&forge.identity, "plank", 1).await.unwrap();
    service.decompose(&forge.identity, "plank", 1).await.unwrap_err();

    service.shutdown(Duration::from_secs(1)).await.unwrap();

    let types: Vec<&str> =
        publisher.published().iter().map(|e| e.event.event_type()).collect();
    assert_eq!(types, vec!["item_combined", "item_decomposed"]);
}

#[tokio::test]
async fn test_shutdown_deadline_reports_pending() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 1)]);
    let publisher = Arc::new(RecordingPublisher::with_delay(Duration::from_millis(500)));
    let service = CraftingService::new(forge.store.clone(), CraftingConfig::without_bonuses())
        .with_publisher(publisher.clone());

    service.combine(&forge.identity, "plank", 1).await.unwrap();
    assert_eq!(service.pending_emissions(), 1);

    let err = service.shutdown(Duration::from_millis(20)).await.unwrap_err();
    assert!(matches!(err, ShutdownError::DeadlineExceeded { pending: 1, .. }));

    // The committed outcome is unaffected
    assert_eq!(forge.inventory().total_quantity(PLANK), 1);
}

#[tokio::test]
async fn test_delivery_outlives_the_caller() {
    let forge = Forge::seed().unwrap();
    forge.stock(&[(WOOD, 1)]);
    let publisher = Arc::new(RecordingPublisher::with_delay(Duration::from_millis(200)));
    let service = Arc::new(
        CraftingService::new(forge.store.clone(), CraftingConfig::without_bonuses())
            .with_publisher(publisher.clone()),
    );

    let caller = {
        let service = Arc::clone(&service);
        let identity = forge.identity.clone();
        tokio::spawn(async move { service.combine(&identity, "plank", 1).await.map(|_| ()) })
    };
    caller.await.unwrap().unwrap();

    // Caller task is gone; delivery is still in flight
    assert_eq!(publisher.count(), 0);
    assert_eq!(service.pending_emissions(), 1);

    service.shutdown(Duration::from_secs(1)).await.unwrap();
    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].event.event_type(), "item_combined");
}
