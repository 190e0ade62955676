use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use smx_reconcile::RunClock;
use smx_runtime::{run_reconciliation, IdentityResolver, RunDeps, RunOptions};
use smx_schemas::ProtocolVersion;
use smx_testkit::{
    fixed_now, FakeLookup, FixtureDeal, MemStore, SnapshotFixture, StaticSnapshotSource,
};

async fn deps(store: Arc<MemStore>, source: StaticSnapshotSource) -> RunDeps {
    let resolver = Arc::new(
        IdentityResolver::load(Arc::new(FakeLookup::new()), store.clone())
            .await
            .unwrap(),
    );
    RunDeps {
        deals: store,
        resolver,
        snapshot: Arc::new(source),
        client_sync: None,
    }
}

fn opts() -> RunOptions {
    RunOptions::new(RunClock::new(fixed_now(), Duration::hours(24)))
}

#[tokio::test]
async fn bad_deal_id_key_aborts_after_earlier_entries_were_applied() {
    let store = Arc::new(MemStore::new());
    store.add_car("baga-t", ProtocolVersion::V1);

    let fixture = SnapshotFixture::new()
        .deal(1, FixtureDeal::new("f1x", "f0200", "baga-t"))
        .raw_entry("not-a-deal-id", json!({}));

    let err = run_reconciliation(&deps(store.clone(), fixture.source()).await, &opts())
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("stage snapshot reconcile failed"), "{chain}");
    assert!(chain.contains("invalid deal id key 'not-a-deal-id'"), "{chain}");

    // Writes flushed before the failure stay.
    assert!(store.deal_by_chain_id(1).is_some());
}

#[tokio::test]
async fn truncated_snapshot_aborts() {
    let store = Arc::new(MemStore::new());
    let mut bytes = SnapshotFixture::new()
        .deal(1, FixtureDeal::new("f1x", "f0200", "baga-t"))
        .to_json_bytes();
    bytes.truncate(bytes.len() / 2);

    let err = run_reconciliation(
        &deps(store.clone(), StaticSnapshotSource::new(bytes, false)).await,
        &opts(),
    )
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("snapshot decode failed"), "{err:#}");
}

#[tokio::test]
async fn persistence_failure_aborts() {
    let store = Arc::new(MemStore::new());
    store.add_car("baga-t", ProtocolVersion::V2);
    store.fail_deal_writes();

    let fixture = SnapshotFixture::new().deal(1, FixtureDeal::new("f1x", "f0200", "baga-t"));
    let err = run_reconciliation(&deps(store.clone(), fixture.source()).await, &opts())
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("insert external deal"), "{chain}");
    assert!(chain.contains("injected failure"), "{chain}");
}

#[tokio::test]
async fn epoch_wider_than_i32_is_a_decode_error() {
    let store = Arc::new(MemStore::new());
    store.add_car("baga-t", ProtocolVersion::V1);

    let fixture = SnapshotFixture::new()
        .deal(1, FixtureDeal::new("f1x", "f0200", "baga-t"))
        .deal(
            2,
            FixtureDeal::new("f1x", "f0200", "baga-t").epochs(i64::MAX / 2, i64::MAX),
        );

    let err = run_reconciliation(&deps(store.clone(), fixture.source()).await, &opts())
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("stage snapshot reconcile failed"), "{chain}");
    assert!(chain.contains("snapshot decode failed"), "{chain}");
    assert!(chain.contains("deal 2"), "{chain}");

    assert!(store.deal_by_chain_id(1).is_some());
    assert!(store.deal_by_chain_id(2).is_none());
}
