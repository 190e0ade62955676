//! Chain epoch <-> wall-clock conversion.
//!
//! ```text
//! epoch = floor((unix_seconds - GENESIS_UNIX) / 30)
//! unix_seconds = epoch * 30 + GENESIS_UNIX
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use smx_schemas::ChainEpoch;

/// Unix time of epoch 0 (mainnet genesis).
pub const GENESIS_UNIX: i64 = 1_598_306_400;

/// Seconds per epoch.
pub const EPOCH_SECONDS: i64 = 30;

/// Default distance between "now" and the reference epoch.
pub const DEFAULT_REFERENCE_LAG_HOURS: i64 = 24;

/// Saturates outside the chain's 32-bit epoch range.
pub fn epoch_to_unix(epoch: ChainEpoch) -> i64 {
    epoch
        .saturating_mul(EPOCH_SECONDS)
        .saturating_add(GENESIS_UNIX)
}

pub fn unix_to_epoch(unix_seconds: i64) -> ChainEpoch {
    (unix_seconds - GENESIS_UNIX).div_euclid(EPOCH_SECONDS)
}

/// `None` when the epoch lies outside chrono's representable range.
pub fn epoch_to_timestamp(epoch: ChainEpoch) -> Option<DateTime<Utc>> {
    let unix = epoch
        .checked_mul(EPOCH_SECONDS)?
        .checked_add(GENESIS_UNIX)?;
    Utc.timestamp_opt(unix, 0).single()
}

pub fn timestamp_to_epoch(ts: DateTime<Utc>) -> ChainEpoch {
    unix_to_epoch(ts.timestamp())
}

/// Epoch of `now - lag`. With the default lag this is "yesterday". Clamps to
/// the earliest representable time instead of overflowing.
pub fn reference_epoch(now: DateTime<Utc>, lag: Duration) -> ChainEpoch {
    timestamp_to_epoch(now.checked_sub_signed(lag).unwrap_or(DateTime::<Utc>::MIN_UTC))
}

/// Wall-clock snapshot taken once at the start of a run.
///
/// Classification and the expiry sweep both read the reference epoch from the
/// same clock so they agree on what "stale" means for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    now: DateTime<Utc>,
    reference_lag: Duration,
}

impl RunClock {
    pub fn new(now: DateTime<Utc>, reference_lag: Duration) -> Self {
        Self { now, reference_lag }
    }

    pub fn system() -> Self {
        Self::new(Utc::now(), Duration::hours(DEFAULT_REFERENCE_LAG_HOURS))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn reference_epoch(&self) -> ChainEpoch {
        reference_epoch(self.now, self.reference_lag)
    }
}
