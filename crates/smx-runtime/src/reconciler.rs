//! Snapshot pass: one planned write per entry, applied in stream order.

use anyhow::{Context, Result};
use smx_chain::{SnapshotEntry, SnapshotStream};
use smx_db::DealStore;
use smx_reconcile::{ChainDealFields, ObservedDeal, PlannedWrite, ReconcileIndex};
use smx_schemas::ChainEpoch;

use crate::resolver::{IdentityResolver, ResolveError};

const PROGRESS_EVERY: u64 = 500_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub seen: u64,
    /// Known deals moved forward along the lattice.
    pub updated: u64,
    pub unchanged: u64,
    /// Known deals whose recomputed state would move backward.
    pub held_back: u64,
    pub bound: u64,
    pub inserted: u64,
    pub ignored: u64,
}

impl ReconcileCounts {
    pub fn writes(&self) -> u64 {
        self.updated + self.bound + self.inserted
    }
}

/// Client as used in the pending key. Every failure falls back to the raw
/// string; only non-"not found" failures are worth a warning.
async fn client_key(resolver: &IdentityResolver, raw: &str, deal_id: u64) -> String {
    match resolver.resolve(raw).await {
        Ok(m) => m.actor_id,
        Err(ResolveError::NotFound(_)) => raw.to_string(),
        Err(e) => {
            tracing::warn!(deal_id, client = raw, error = %e, "client resolution failed; using raw client");
            raw.to_string()
        }
    }
}

pub fn observe(entry: &SnapshotEntry, client_key: String) -> ObservedDeal {
    let p = &entry.deal.proposal;
    let s = &entry.deal.state;
    ObservedDeal {
        deal_id: entry.deal_id,
        client_key,
        raw_client: p.client.clone(),
        provider: p.provider.clone(),
        piece_cid: entry.deal.piece_cid().to_string(),
        piece_size: p.piece_size,
        label: p.label.clone(),
        verified: p.verified_deal,
        raw_price: p.storage_price_per_epoch.clone(),
        fields: ChainDealFields {
            slash_epoch: s.slash_epoch,
            sector_start_epoch: s.sector_start_epoch,
            start_epoch: p.start_epoch,
            end_epoch: p.end_epoch,
        },
    }
}

/// Drain `stream` against `index`. Decode and persistence failures abort.
pub async fn reconcile_snapshot(
    stream: &mut SnapshotStream,
    index: &mut ReconcileIndex,
    store: &dyn DealStore,
    resolver: &IdentityResolver,
    reference_epoch: ChainEpoch,
) -> Result<ReconcileCounts> {
    let mut counts = ReconcileCounts::default();

    while let Some(entry) = stream
        .next()
        .await
        .with_context(|| format!("snapshot decode failed after {} entries", counts.seen))?
    {
        counts.seen += 1;

        let key = client_key(resolver, &entry.deal.proposal.client, entry.deal_id).await;
        let observed = observe(&entry, key);
        let write = index.plan(&observed, reference_epoch)?;

        match write {
            PlannedWrite::Unchanged { .. } => counts.unchanged += 1,
            PlannedWrite::HeldBack {
                deal_id,
                current,
                observed,
            } => {
                tracing::debug!(deal_id, current = %current, observed = %observed, "backward transition held");
                counts.held_back += 1;
            }
            PlannedWrite::Refresh {
                record_id,
                from,
                update,
            } => {
                store
                    .apply_chain_update(record_id, &update)
                    .await
                    .with_context(|| format!("refresh deal {}", update.deal_id))?;
                tracing::debug!(deal_id = update.deal_id, from = %from, to = %update.state, "deal state advanced");
                counts.updated += 1;
            }
            PlannedWrite::Bind { record_id, update } => {
                store
                    .apply_chain_update(record_id, &update)
                    .await
                    .with_context(|| format!("bind deal {} to record {record_id}", update.deal_id))?;
                tracing::debug!(deal_id = update.deal_id, %record_id, state = %update.state, "pending deal bound");
                counts.bound += 1;
            }
            PlannedWrite::InsertExternal { record } => {
                store
                    .insert_deal(&record)
                    .await
                    .with_context(|| format!("insert external deal {:?}", record.deal_id))?;
                counts.inserted += 1;
            }
            PlannedWrite::Ignore { .. } => counts.ignored += 1,
        }

        if counts.seen % PROGRESS_EVERY == 0 {
            tracing::info!(
                seen = counts.seen,
                updated = counts.updated,
                bound = counts.bound,
                inserted = counts.inserted,
                "snapshot progress"
            );
        }
    }

    Ok(counts)
}
