//! Verified-clients refresh.

use anyhow::{Context, Result};
use smx_chain::VerifiedClientFeed;
use smx_db::{UpsertOutcome, VerifiedClientStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientSyncCounts {
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
}

pub async fn sync_verified_clients(
    feed: &dyn VerifiedClientFeed,
    store: &dyn VerifiedClientStore,
) -> Result<ClientSyncCounts> {
    let clients = feed.fetch().await.context("fetch verified clients")?;

    let mut counts = ClientSyncCounts {
        fetched: clients.len() as u64,
        ..ClientSyncCounts::default()
    };
    for client in &clients {
        match store.upsert_verified_client(client).await? {
            UpsertOutcome::Inserted => counts.inserted += 1,
            UpsertOutcome::Updated => counts.updated += 1,
        }
    }

    tracing::info!(
        fetched = counts.fetched,
        inserted = counts.inserted,
        updated = counts.updated,
        "verified clients synced"
    );
    Ok(counts)
}
