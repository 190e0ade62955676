//! In-memory reconciliation index, built once per run from persisted state.
//!
//! - [`PendingQueues`]: pending (unmatched) deals grouped into FIFO queues by
//!   composite key `(client, provider, piece_cid)`.
//! - [`KnownDeals`]: on-chain deal id -> owning record and its current state.
//! - [`PieceSets`]: piece CIDs observed per telemetry protocol version.

use std::collections::{HashMap, HashSet, VecDeque};

use smx_schemas::{CarPiece, DealState, KnownDeal, PendingDeal, ProtocolVersion};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Pending queues
// ---------------------------------------------------------------------------

/// Composite key a pending deal is matched on.
///
/// `client` is the resolved actor id when resolution succeeded, otherwise the
/// raw client string as reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingDealKey {
    pub client: String,
    pub provider: String,
    pub piece_cid: String,
}

impl PendingDealKey {
    pub fn new(
        client: impl Into<String>,
        provider: impl Into<String>,
        piece_cid: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            provider: provider.into(),
            piece_cid: piece_cid.into(),
        }
    }
}

impl std::fmt::Display for PendingDealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.client, self.provider, self.piece_cid)
    }
}

/// FIFO queues of pending deals. The front of each queue is the oldest record.
#[derive(Debug, Clone, Default)]
pub struct PendingQueues {
    queues: HashMap<PendingDealKey, VecDeque<PendingDeal>>,
    total: usize,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from keyed entries in store order.
    ///
    /// Entries are stably sorted by `created_at` first, so ties keep the order
    /// the store returned them in.
    pub fn from_entries(mut entries: Vec<(PendingDealKey, PendingDeal)>) -> Self {
        entries.sort_by_key(|(_, d)| d.created_at);
        let mut out = Self::new();
        for (key, deal) in entries {
            out.push_back(key, deal);
        }
        out
    }

    /// Append to the back of the key's queue. Callers must push in creation order.
    pub fn push_back(&mut self, key: PendingDealKey, deal: PendingDeal) {
        self.queues.entry(key).or_default().push_back(deal);
        self.total += 1;
    }

    /// Remove and return the oldest pending deal for `key`. Empty queues are dropped.
    pub fn take_oldest(&mut self, key: &PendingDealKey) -> Option<PendingDeal> {
        let queue = self.queues.get_mut(key)?;
        let deal = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(key);
        }
        if deal.is_some() {
            self.total -= 1;
        }
        deal
    }

    pub fn queue_len(&self, key: &PendingDealKey) -> usize {
        self.queues.get(key).map(|q| q.len()).unwrap_or(0)
    }

    pub fn contains_key(&self, key: &PendingDealKey) -> bool {
        self.queues.contains_key(key)
    }

    /// Number of distinct composite keys with at least one pending deal.
    pub fn key_count(&self) -> usize {
        self.queues.len()
    }

    /// Total pending deals across all queues.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

// ---------------------------------------------------------------------------
// Known deals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct KnownDeals {
    by_deal_id: HashMap<u64, KnownDeal>,
}

impl KnownDeals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = KnownDeal>) -> Self {
        let mut out = Self::new();
        for row in rows {
            out.insert(row);
        }
        out
    }

    pub fn insert(&mut self, deal: KnownDeal) {
        self.by_deal_id.insert(deal.deal_id, deal);
    }

    pub fn get(&self, deal_id: u64) -> Option<&KnownDeal> {
        self.by_deal_id.get(&deal_id)
    }

    pub fn contains(&self, deal_id: u64) -> bool {
        self.by_deal_id.contains_key(&deal_id)
    }

    pub fn set_state(&mut self, deal_id: u64, state: DealState) {
        if let Some(d) = self.by_deal_id.get_mut(&deal_id) {
            d.state = state;
        }
    }

    pub fn mark_bound(&mut self, deal_id: u64, record_id: Uuid, state: DealState) {
        self.insert(KnownDeal {
            deal_id,
            record_id,
            state,
        });
    }

    pub fn len(&self) -> usize {
        self.by_deal_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_deal_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Piece sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PieceSets {
    v1: HashSet<String>,
    v2: HashSet<String>,
}

impl PieceSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pieces(pieces: impl IntoIterator<Item = CarPiece>) -> Self {
        let mut out = Self::new();
        for p in pieces {
            out.insert(p);
        }
        out
    }

    pub fn insert(&mut self, piece: CarPiece) {
        match piece.protocol {
            ProtocolVersion::V1 => self.v1.insert(piece.piece_cid),
            ProtocolVersion::V2 => self.v2.insert(piece.piece_cid),
        };
    }

    /// Which protocol generation tracks `piece_cid`. V2 wins when both do.
    pub fn attribute(&self, piece_cid: &str) -> Option<ProtocolVersion> {
        if self.v2.contains(piece_cid) {
            Some(ProtocolVersion::V2)
        } else if self.v1.contains(piece_cid) {
            Some(ProtocolVersion::V1)
        } else {
            None
        }
    }

    pub fn v1_len(&self) -> usize {
        self.v1.len()
    }

    pub fn v2_len(&self) -> usize {
        self.v2.len()
    }
}

// ---------------------------------------------------------------------------
// Index bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ReconcileIndex {
    pub pending: PendingQueues,
    pub known: KnownDeals,
    pub pieces: PieceSets,
}

impl ReconcileIndex {
    pub fn new(pending: PendingQueues, known: KnownDeals, pieces: PieceSets) -> Self {
        Self {
            pending,
            known,
            pieces,
        }
    }
}
