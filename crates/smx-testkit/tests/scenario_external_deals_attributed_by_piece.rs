use std::sync::Arc;

use chrono::Duration;
use smx_reconcile::{epoch_to_timestamp, RunClock};
use smx_runtime::{run_reconciliation, IdentityResolver, RunDeps, RunOptions};
use smx_schemas::{DealState, ProtocolVersion, EXTERNAL_INSTANCE_ID};
use smx_testkit::{fixed_now, FakeLookup, FixtureDeal, MemStore, SnapshotFixture};

const REF: i64 = 3_695_280;

async fn run(store: Arc<MemStore>, fixture: SnapshotFixture) -> smx_runtime::RunReport {
    let resolver = Arc::new(
        IdentityResolver::load(Arc::new(FakeLookup::new()), store.clone())
            .await
            .unwrap(),
    );
    let deps = RunDeps {
        deals: store,
        resolver,
        snapshot: Arc::new(fixture.source()),
        client_sync: None,
    };
    run_reconciliation(&deps, &RunOptions::new(RunClock::new(fixed_now(), Duration::hours(24))))
        .await
        .unwrap()
}

#[tokio::test]
async fn piece_tracked_by_both_protocols_is_attributed_to_v2() {
    let store = Arc::new(MemStore::new());
    store.add_car("baga-both", ProtocolVersion::V1);
    store.add_car("baga-both", ProtocolVersion::V2);
    store.add_car("baga-old", ProtocolVersion::V1);

    let fixture = SnapshotFixture::new()
        .deal(
            800,
            FixtureDeal::new("f1stranger", "f0200", "baga-both")
                .epochs(REF + 10, REF + 1_000_000)
                .price("1000000000000000000"),
        )
        .deal(
            801,
            FixtureDeal::new("f1stranger", "f0200", "baga-old").epochs(REF + 10, REF + 1_000_000),
        )
        .deal(802, FixtureDeal::new("f1stranger", "f0200", "baga-unknown"));

    let report = run(store.clone(), fixture).await;
    assert_eq!(report.reconcile.inserted, 2);
    assert_eq!(report.reconcile.ignored, 1);

    let both = store.deal_by_chain_id(800).unwrap();
    assert_eq!(both.reporter.protocol, ProtocolVersion::V2);
    assert_eq!(both.reporter.instance_id, EXTERNAL_INSTANCE_ID);
    assert_eq!(both.client, "f1stranger");
    assert_eq!(both.state, DealState::Published);
    assert_eq!(Some(both.created_at), epoch_to_timestamp(REF + 10));
    assert!((both.price - 1.0).abs() < 1e-12, "price={}", both.price);

    let old = store.deal_by_chain_id(801).unwrap();
    assert_eq!(old.reporter.protocol, ProtocolVersion::V1);

    assert!(store.deal_by_chain_id(802).is_none());
}

#[tokio::test]
async fn zero_piece_size_on_a_tracked_piece_aborts_the_run() {
    let store = Arc::new(MemStore::new());
    store.add_car("baga-zero", ProtocolVersion::V2);

    let fixture = SnapshotFixture::new().deal(
        900,
        FixtureDeal::new("f1stranger", "f0200", "baga-zero")
            .piece_size(0)
            .price("1"),
    );

    let resolver = Arc::new(
        IdentityResolver::load(Arc::new(FakeLookup::new()), store.clone())
            .await
            .unwrap(),
    );
    let deps = RunDeps {
        deals: store.clone(),
        resolver,
        snapshot: Arc::new(fixture.source()),
        client_sync: None,
    };
    let err = run_reconciliation(&deps, &RunOptions::new(RunClock::new(fixed_now(), Duration::hours(24))))
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("stage snapshot reconcile failed"), "{chain}");
    assert!(chain.contains("piece size is zero"), "{chain}");
    assert!(store.deals().is_empty());
}
