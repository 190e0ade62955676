use std::sync::Arc;

use smx_runtime::{IdentityResolver, ResolveError};
use smx_testkit::{FakeLookup, MemStore};

#[tokio::test]
async fn actor_id_then_account_key_resolve_to_the_same_mapping() {
    let lookup = Arc::new(FakeLookup::with_pair("f01234", "f1accountkey1234"));
    let store = Arc::new(MemStore::new());
    let resolver = IdentityResolver::load(lookup.clone(), store.clone())
        .await
        .unwrap();

    let by_actor = resolver.resolve("f01234").await.unwrap();
    assert_eq!(by_actor.actor_id, "f01234");
    assert_eq!(by_actor.account_key, "f1accountkey1234");
    assert_eq!(lookup.calls(), 1);

    let by_key = resolver.resolve("f1accountkey1234").await.unwrap();
    assert_eq!(by_key, by_actor);

    for _ in 0..5 {
        resolver.resolve("f01234").await.unwrap();
        resolver.resolve("f1accountkey1234").await.unwrap();
    }
    assert_eq!(lookup.calls(), 1, "cached resolutions must not call out");

    assert_eq!(store.client_mappings(), vec![by_actor]);
    let stats = resolver.stats().await;
    assert_eq!(stats.remote_calls, 1);
    assert_eq!(stats.cached_mappings, 1);
}

#[tokio::test]
async fn not_found_is_cached_for_the_run() {
    let lookup = Arc::new(FakeLookup::new());
    let store = Arc::new(MemStore::new());
    let resolver = IdentityResolver::load(lookup.clone(), store.clone())
        .await
        .unwrap();

    let first = resolver.resolve("f1nobody").await.unwrap_err();
    assert!(matches!(first, ResolveError::NotFound(ref id) if id == "f1nobody"));
    assert_eq!(lookup.calls(), 1);

    let second = resolver.resolve("f1nobody").await.unwrap_err();
    assert!(second.is_not_found());
    assert_eq!(lookup.calls(), 1, "cached NotFound fails without a remote call");

    assert!(store.client_mappings().is_empty());
    assert_eq!(resolver.stats().await.unresolvable, 1);
}

#[tokio::test]
async fn persisted_mappings_seed_a_new_run() {
    let store = Arc::new(MemStore::new());
    let seeded = store.add_mapping("f0777", "f3seven");

    let lookup = Arc::new(FakeLookup::new());
    let resolver = IdentityResolver::load(lookup.clone(), store.clone())
        .await
        .unwrap();

    assert_eq!(resolver.resolve("f3seven").await.unwrap(), seeded);
    assert_eq!(resolver.resolve("f0777").await.unwrap(), seeded);
    assert_eq!(lookup.calls(), 0);
}

#[tokio::test]
async fn concurrent_resolutions_of_one_id_call_out_once() {
    let lookup = Arc::new(FakeLookup::with_pair("f0900", "f1nine"));
    let store = Arc::new(MemStore::new());
    let resolver = Arc::new(
        IdentityResolver::load(lookup.clone(), store.clone())
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let r = resolver.clone();
        handles.push(tokio::spawn(async move { r.resolve("f1nine").await.unwrap() }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap().actor_id, "f0900");
    }

    assert_eq!(lookup.calls(), 1);
    assert_eq!(store.mapping_inserts(), 1);
}
