//! Build phase: load pending, known and piece data into a [`ReconcileIndex`].

use anyhow::{Context, Result};
use smx_db::DealStore;
use smx_reconcile::{KnownDeals, PendingDealKey, PendingQueues, PieceSets, ReconcileIndex};

use crate::resolver::{IdentityResolver, ResolveError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexBuildStats {
    pub pending: usize,
    pub pending_keys: usize,
    /// Pending records whose client fell back to the raw string.
    pub raw_clients: usize,
    pub known: usize,
    pub pieces_v1: usize,
    pub pieces_v2: usize,
}

/// Fatal resolution errors abort; `NotFound` keys the record by its raw
/// client string.
pub async fn build_index(
    store: &dyn DealStore,
    resolver: &IdentityResolver,
) -> Result<(ReconcileIndex, IndexBuildStats)> {
    let pending = store.load_pending_deals().await?;

    let mut raw_clients = 0usize;
    let mut entries = Vec::with_capacity(pending.len());
    for deal in pending {
        let client = match resolver.resolve(&deal.client).await {
            Ok(m) => m.actor_id,
            Err(ResolveError::NotFound(_)) => {
                raw_clients += 1;
                deal.client.clone()
            }
            Err(ResolveError::Fatal(e)) => {
                return Err(e).with_context(|| {
                    format!("resolve client of pending deal {}", deal.record_id)
                });
            }
        };
        let key = PendingDealKey::new(client, deal.provider.clone(), deal.piece_cid.clone());
        entries.push((key, deal));
    }
    let pending = PendingQueues::from_entries(entries);

    let known = KnownDeals::from_rows(store.load_known_deals().await?);
    let pieces = PieceSets::from_pieces(store.load_car_pieces().await?);

    let stats = IndexBuildStats {
        pending: pending.len(),
        pending_keys: pending.key_count(),
        raw_clients,
        known: known.len(),
        pieces_v1: pieces.v1_len(),
        pieces_v2: pieces.v2_len(),
    };
    tracing::info!(
        pending = stats.pending,
        pending_keys = stats.pending_keys,
        raw_clients = stats.raw_clients,
        known = stats.known,
        pieces_v1 = stats.pieces_v1,
        pieces_v2 = stats.pieces_v2,
        "reconcile index built"
    );

    Ok((ReconcileIndex::new(pending, known, pieces), stats))
}
