//! Post-stream bulk expiry.

use anyhow::{Context, Result};
use chrono::Duration;
use smx_db::DealStore;
use smx_reconcile::RunClock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub expired: u64,
    pub proposals_expired: u64,
}

/// `active` past its end epoch becomes `expired`. `proposed`/`published` past
/// its start epoch, or created more than `proposal_max_age` before the run
/// clock, becomes `proposal_expired`.
pub async fn sweep_expired(
    store: &dyn DealStore,
    clock: &RunClock,
    proposal_max_age: Duration,
) -> Result<SweepCounts> {
    let reference_epoch = clock.reference_epoch();
    let created_before = clock
        .now()
        .checked_sub_signed(proposal_max_age)
        .with_context(|| format!("proposal max age {proposal_max_age} out of range"))?;

    let expired = store
        .expire_active_deals(reference_epoch)
        .await
        .context("expire active deals")?;
    let proposals_expired = store
        .expire_stale_proposals(reference_epoch, created_before)
        .await
        .context("expire stale proposals")?;

    tracing::info!(
        reference_epoch,
        %created_before,
        expired,
        proposals_expired,
        "expiry sweep done"
    );
    Ok(SweepCounts {
        expired,
        proposals_expired,
    })
}
