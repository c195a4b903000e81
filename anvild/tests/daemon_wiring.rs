//! Daemon wiring: service, bus, dead letter and metrics together.

use std::collections::BTreeMap;

use anvil_exec::Operation;
use anvil_store::MemoryStore;
use anvil_testkit::{catalog::*, Forge};
use anvild::{Config, Daemon};

fn config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::test();
    config.events.dead_letter_path = dir.path().join("dead_letter.jsonl");
    config
}

#[tokio::test]
async fn test_combine_reaches_bus_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let forge = Forge::seed_into(MemoryStore::new()).unwrap();
    forge.stock(&[(WOOD, 3)]);

    let daemon = Daemon::new(config(&dir), forge.store.clone()).unwrap();
    let mut events = daemon.bus().subscribe();

    let outcome = daemon.service().combine(&forge.identity, "plank", 3).await.unwrap();
    assert_eq!(outcome.quantity_produced, 3);
    daemon.service().combine(&forge.identity, "plank", 1).await.unwrap_err();

    daemon.shutdown().await.unwrap();

    let envelope = events.recv().await.unwrap().unwrap();
    assert_eq!(envelope.event.event_type(), "item_combined");
    assert_eq!(forge.totals(), BTreeMap::from([(PLANK, 3)]));

    let metrics = daemon.metrics();
    assert_eq!(metrics.operation_count(Operation::Combine, "ok"), 1);
    assert_eq!(metrics.operation_count(Operation::Combine, "insufficient_quantity"), 1);
    assert!(!dir.path().join("dead_letter.jsonl").exists());
}

#[tokio::test]
async fn test_unobserved_events_are_dead_lettered() {
    let dir = tempfile::tempdir().unwrap();
    let forge = Forge::seed().unwrap();
    forge.stock(&[(PLANK, 2)]);

    let daemon = Daemon::new(config(&dir), forge.store.clone()).unwrap();
    daemon.service().decompose(&forge.identity, "plank", 2).await.unwrap();
    daemon.shutdown().await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("dead_letter.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("item_decomposed"));
    assert_eq!(forge.totals(), BTreeMap::from([(WOOD, 2)]));
}
