//! smx-runtime
//!
//! Orchestrates one reconciliation run:
//!
//! 1. optional verified-clients sync
//! 2. index build (pending queues, known deal ids, tracked pieces)
//! 3. snapshot pass (one planned write per entry)
//! 4. expiry sweep
//!
//! Every collaborator arrives through [`RunDeps`]; nothing is global.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use smx_chain::{SnapshotSource, VerifiedClientFeed};
use smx_db::{DealStore, VerifiedClientStore};
use smx_reconcile::RunClock;
use smx_schemas::ChainEpoch;

pub mod clients_sync;
pub mod index_builder;
pub mod reconciler;
pub mod resolver;
pub mod sweeper;

pub use clients_sync::{sync_verified_clients, ClientSyncCounts};
pub use index_builder::{build_index, IndexBuildStats};
pub use reconciler::{reconcile_snapshot, ReconcileCounts};
pub use resolver::{IdentityResolver, ResolveError, ResolverStats};
pub use sweeper::{sweep_expired, SweepCounts};

/// Default age after which an unsealed proposal is given up on.
pub const DEFAULT_PROPOSAL_MAX_AGE_DAYS: i64 = 30;

/// Feed + store pair for the verified-clients sync.
#[derive(Clone)]
pub struct ClientSyncDeps {
    pub feed: Arc<dyn VerifiedClientFeed>,
    pub store: Arc<dyn VerifiedClientStore>,
}

/// Collaborators for one run. The mapping store lives inside `resolver`.
#[derive(Clone)]
pub struct RunDeps {
    pub deals: Arc<dyn DealStore>,
    pub resolver: Arc<IdentityResolver>,
    pub snapshot: Arc<dyn SnapshotSource>,
    /// `None` skips the verified-clients sync.
    pub client_sync: Option<ClientSyncDeps>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub clock: RunClock,
    pub proposal_max_age: Duration,
}

impl RunOptions {
    pub fn new(clock: RunClock) -> Self {
        Self {
            clock,
            proposal_max_age: Duration::days(DEFAULT_PROPOSAL_MAX_AGE_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub reference_epoch: ChainEpoch,
    pub client_sync: Option<ClientSyncCounts>,
    pub index: IndexBuildStats,
    pub reconcile: ReconcileCounts,
    pub sweep: SweepCounts,
    pub resolver: ResolverStats,
}

impl RunReport {
    /// `key=value` lines for operator output.
    pub fn to_lines(&self) -> Vec<String> {
        let mut out = vec![format!("reference_epoch={}", self.reference_epoch)];
        if let Some(cs) = &self.client_sync {
            out.push(format!("clients_fetched={}", cs.fetched));
            out.push(format!("clients_inserted={}", cs.inserted));
            out.push(format!("clients_updated={}", cs.updated));
        }
        out.push(format!("pending={}", self.index.pending));
        out.push(format!("known={}", self.index.known));
        out.push(format!("seen={}", self.reconcile.seen));
        out.push(format!("updated={}", self.reconcile.updated));
        out.push(format!("unchanged={}", self.reconcile.unchanged));
        out.push(format!("held_back={}", self.reconcile.held_back));
        out.push(format!("bound={}", self.reconcile.bound));
        out.push(format!("inserted={}", self.reconcile.inserted));
        out.push(format!("ignored={}", self.reconcile.ignored));
        out.push(format!("expired={}", self.sweep.expired));
        out.push(format!("proposals_expired={}", self.sweep.proposals_expired));
        out.push(format!("identity_lookups={}", self.resolver.remote_calls));
        out
    }
}

/// Run every stage once. Any stage failure aborts the run; the error chain
/// names the stage.
pub async fn run_reconciliation(deps: &RunDeps, opts: &RunOptions) -> Result<RunReport> {
    let reference_epoch = opts.clock.reference_epoch();
    tracing::info!(
        reference_epoch,
        now = %opts.clock.now(),
        snapshot = %deps.snapshot.describe(),
        "reconciliation run starting"
    );

    let client_sync = match &deps.client_sync {
        Some(cs) => Some(
            sync_verified_clients(cs.feed.as_ref(), cs.store.as_ref())
                .await
                .context("stage verified-clients sync failed")?,
        ),
        None => None,
    };

    let (mut index, index_stats) = build_index(deps.deals.as_ref(), &deps.resolver)
        .await
        .context("stage index build failed")?;

    let mut stream = deps
        .snapshot
        .open()
        .await
        .with_context(|| format!("stage snapshot open failed: {}", deps.snapshot.describe()))?;
    let counts = reconcile_snapshot(
        &mut stream,
        &mut index,
        deps.deals.as_ref(),
        &deps.resolver,
        reference_epoch,
    )
    .await
    .context("stage snapshot reconcile failed")?;
    tracing::info!(
        seen = counts.seen,
        updated = counts.updated,
        unchanged = counts.unchanged,
        held_back = counts.held_back,
        bound = counts.bound,
        inserted = counts.inserted,
        ignored = counts.ignored,
        "snapshot pass done"
    );

    let sweep = sweep_expired(deps.deals.as_ref(), &opts.clock, opts.proposal_max_age)
        .await
        .context("stage expiry sweep failed")?;

    let resolver = deps.resolver.stats().await;
    let report = RunReport {
        reference_epoch,
        client_sync,
        index: index_stats,
        reconcile: counts,
        sweep,
        resolver,
    };
    tracing::info!(
        writes = report.reconcile.writes(),
        expired = report.sweep.expired,
        proposals_expired = report.sweep.proposals_expired,
        identity_lookups = report.resolver.remote_calls,
        unresolvable = report.resolver.unresolvable,
        "reconciliation run complete"
    );
    Ok(report)
}
