use std::sync::Arc;

use chrono::Duration;
use smx_reconcile::RunClock;
use smx_runtime::{
    run_reconciliation, sync_verified_clients, ClientSyncDeps, IdentityResolver, RunDeps,
    RunOptions,
};
use smx_schemas::VerifiedClient;
use smx_testkit::{fixed_now, FakeLookup, MemStore, SnapshotFixture, StaticFeed};

fn client(id: i32, name: &str) -> VerifiedClient {
    VerifiedClient {
        id,
        address_id: format!("f0{id}"),
        address: format!("f1addr{id}"),
        name: name.to_string(),
        org_name: String::new(),
        region: "Europe".to_string(),
        website: String::new(),
        industry: String::new(),
    }
}

#[tokio::test]
async fn second_sync_updates_instead_of_inserting() {
    let store = MemStore::new();
    let feed = StaticFeed::new(vec![client(1, "one"), client(2, "two")]);

    let first = sync_verified_clients(&feed, &store).await.unwrap();
    assert_eq!((first.fetched, first.inserted, first.updated), (2, 2, 0));

    let renamed = StaticFeed::new(vec![client(1, "one"), client(2, "two renamed")]);
    let second = sync_verified_clients(&renamed, &store).await.unwrap();
    assert_eq!((second.fetched, second.inserted, second.updated), (2, 0, 2));

    let stored = store.verified_clients();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].name, "two renamed");
}

#[tokio::test]
async fn reconciliation_run_syncs_clients_first() {
    let store = Arc::new(MemStore::new());
    let resolver = Arc::new(
        IdentityResolver::load(Arc::new(FakeLookup::new()), store.clone())
            .await
            .unwrap(),
    );
    let deps = RunDeps {
        deals: store.clone(),
        resolver,
        snapshot: Arc::new(SnapshotFixture::new().source()),
        client_sync: Some(ClientSyncDeps {
            feed: Arc::new(StaticFeed::new(vec![client(7, "seven")])),
            store: store.clone(),
        }),
    };

    let report = run_reconciliation(
        &deps,
        &RunOptions::new(RunClock::new(fixed_now(), Duration::hours(24))),
    )
    .await
    .unwrap();

    let sync = report.client_sync.unwrap();
    assert_eq!(sync.inserted, 1);
    assert_eq!(store.verified_clients()[0].id, 7);
    assert!(report.to_lines().contains(&"clients_inserted=1".to_string()));
}
