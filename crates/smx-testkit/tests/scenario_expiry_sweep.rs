use std::sync::Arc;

use chrono::Duration;
use smx_reconcile::RunClock;
use smx_runtime::{run_reconciliation, sweep_expired, IdentityResolver, RunDeps, RunOptions};
use smx_schemas::DealState;
use smx_testkit::{fixed_now, pending_record, FakeLookup, MemStore, SnapshotFixture};

const REF: i64 = 3_695_280;

fn clock() -> RunClock {
    RunClock::new(fixed_now(), Duration::hours(24))
}

#[tokio::test]
async fn sweep_expires_finished_and_abandoned_deals() {
    let store = MemStore::new();

    let mut finished = pending_record("f0100", "f0200", "baga-a", fixed_now() - Duration::days(200));
    finished.deal_id = Some(1);
    finished.state = DealState::Active;
    finished.end_epoch = Some(REF - 1);
    let finished_id = finished.id;

    let mut running = pending_record("f0100", "f0200", "baga-b", fixed_now() - Duration::days(200));
    running.deal_id = Some(2);
    running.state = DealState::Active;
    running.end_epoch = Some(REF);
    let running_id = running.id;

    // Start epoch never set, but created well over 30 days ago.
    let abandoned = pending_record("f0100", "f0200", "baga-c", fixed_now() - Duration::days(31));
    let abandoned_id = abandoned.id;

    let fresh = pending_record("f0100", "f0200", "baga-d", fixed_now() - Duration::days(1));
    let fresh_id = fresh.id;

    let mut missed_start = pending_record("f0100", "f0200", "baga-e", fixed_now() - Duration::days(2));
    missed_start.deal_id = Some(3);
    missed_start.state = DealState::Published;
    missed_start.start_epoch = Some(REF - 1);
    let missed_start_id = missed_start.id;

    for r in [finished, running, abandoned, fresh, missed_start] {
        store.add_deal(r);
    }

    let counts = sweep_expired(&store, &clock(), Duration::days(30))
        .await
        .unwrap();
    assert_eq!(counts.expired, 1);
    assert_eq!(counts.proposals_expired, 2);

    assert_eq!(store.deal(finished_id).unwrap().state, DealState::Expired);
    assert_eq!(store.deal(running_id).unwrap().state, DealState::Active);
    assert_eq!(store.deal(abandoned_id).unwrap().state, DealState::ProposalExpired);
    assert_eq!(store.deal(fresh_id).unwrap().state, DealState::Proposed);
    assert_eq!(store.deal(missed_start_id).unwrap().state, DealState::ProposalExpired);
}

#[tokio::test]
async fn full_run_over_an_empty_snapshot_still_sweeps() {
    let store = Arc::new(MemStore::new());
    let abandoned = pending_record("f1ghost", "f0200", "baga-c", fixed_now() - Duration::days(45));
    let abandoned_id = abandoned.id;
    store.add_deal(abandoned);

    let resolver = Arc::new(
        IdentityResolver::load(Arc::new(FakeLookup::new()), store.clone())
            .await
            .unwrap(),
    );
    let deps = RunDeps {
        deals: store.clone(),
        resolver,
        snapshot: Arc::new(SnapshotFixture::new().source()),
        client_sync: None,
    };
    let report = run_reconciliation(&deps, &RunOptions::new(clock()))
        .await
        .unwrap();

    assert_eq!(report.reconcile.seen, 0);
    assert_eq!(report.index.raw_clients, 1);
    assert_eq!(report.sweep.proposals_expired, 1);
    assert_eq!(store.deal(abandoned_id).unwrap().state, DealState::ProposalExpired);
}

#[tokio::test]
async fn unrepresentable_max_age_is_an_error_not_a_panic() {
    let store = MemStore::new();
    store.add_deal(pending_record("f0100", "f0200", "baga-z", fixed_now() - Duration::days(40)));

    let err = sweep_expired(&store, &clock(), Duration::seconds(i64::MAX / 1_000))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("out of range"), "{err:#}");
    assert_eq!(store.deal_writes(), 0);
}
