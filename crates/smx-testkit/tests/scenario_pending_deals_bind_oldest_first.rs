use std::sync::Arc;

use chrono::Duration;
use smx_reconcile::RunClock;
use smx_runtime::{run_reconciliation, IdentityResolver, RunDeps, RunOptions};
use smx_schemas::DealState;
use smx_testkit::{fixed_now, pending_record, FakeLookup, FixtureDeal, MemStore, SnapshotFixture};

const REF: i64 = 3_695_280;

#[tokio::test]
async fn three_pending_records_with_one_key_bind_in_creation_order() {
    let store = Arc::new(MemStore::new());

    // Inserted newest first; creation time decides the order.
    let newest = pending_record("f1alice", "f0200", "baga-shared", fixed_now() - Duration::hours(1));
    let middle = pending_record("f1alice", "f0200", "baga-shared", fixed_now() - Duration::hours(2));
    let oldest = pending_record("f1alice", "f0200", "baga-shared", fixed_now() - Duration::hours(3));
    let (newest_id, middle_id, oldest_id) = (newest.id, middle.id, oldest.id);
    store.add_deal(newest);
    store.add_deal(middle);
    store.add_deal(oldest);

    // On-chain the client shows up by actor id.
    let deal = || FixtureDeal::new("f0100", "f0200", "baga-shared").epochs(REF + 100, REF + 900_000);
    let fixture = SnapshotFixture::new()
        .deal(71, deal())
        .deal(72, deal().sealed_at(REF - 5))
        .deal(73, deal());

    let lookup = Arc::new(FakeLookup::with_pair("f0100", "f1alice"));
    let resolver = Arc::new(
        IdentityResolver::load(lookup.clone(), store.clone())
            .await
            .unwrap(),
    );
    let deps = RunDeps {
        deals: store.clone(),
        resolver,
        snapshot: Arc::new(fixture.source()),
        client_sync: None,
    };

    let report = run_reconciliation(&deps, &RunOptions::new(RunClock::new(fixed_now(), Duration::hours(24))))
        .await
        .unwrap();
    assert_eq!(report.reconcile.bound, 3);
    assert_eq!(report.index.pending, 3);
    assert_eq!(report.index.pending_keys, 1);

    let oldest = store.deal(oldest_id).unwrap();
    let middle = store.deal(middle_id).unwrap();
    let newest = store.deal(newest_id).unwrap();
    assert_eq!(oldest.deal_id, Some(71));
    assert_eq!(middle.deal_id, Some(72));
    assert_eq!(newest.deal_id, Some(73));

    assert_eq!(oldest.state, DealState::Published);
    assert_eq!(middle.state, DealState::Active);
    assert_eq!(middle.sector_start_epoch, Some(REF - 5));
    assert_eq!(middle.duration, 900_000 - 100);

    // Build phase resolved f1alice; the stream reuses the cached mapping.
    assert_eq!(lookup.calls(), 1);
}

#[tokio::test]
async fn more_on_chain_deals_than_pending_records_leaves_the_rest_unmatched() {
    let store = Arc::new(MemStore::new());
    let only = pending_record("f0100", "f0200", "baga-one", fixed_now() - Duration::hours(1));
    let only_id = only.id;
    store.add_deal(only);

    let deal = || FixtureDeal::new("f0100", "f0200", "baga-one").epochs(REF + 100, REF + 900_000);
    let fixture = SnapshotFixture::new().deal(9, deal()).deal(10, deal());

    let lookup = Arc::new(FakeLookup::with_pair("f0100", "f1alice"));
    let resolver = Arc::new(
        IdentityResolver::load(lookup, store.clone())
            .await
            .unwrap(),
    );
    let deps = RunDeps {
        deals: store.clone(),
        resolver,
        snapshot: Arc::new(fixture.source()),
        client_sync: None,
    };

    let report = run_reconciliation(&deps, &RunOptions::new(RunClock::new(fixed_now(), Duration::hours(24))))
        .await
        .unwrap();
    assert_eq!(report.reconcile.bound, 1);
    assert_eq!(report.reconcile.ignored, 1);
    assert_eq!(store.deal(only_id).unwrap().deal_id, Some(9));
    assert!(store.deal_by_chain_id(10).is_none());
}
