//! smx-reconcile
//!
//! Deal lifecycle reconciliation: the pure half.
//!
//! - Epoch <-> wall-clock math and the per-run reference epoch
//! - Deal state classification from raw on-chain fields
//! - Price normalization (attoFIL/epoch -> FIL/GiB/epoch)
//! - The in-memory reconciliation index and the per-entry write plan
//!
//! Deterministic, pure logic. No IO, no store calls, no network.

pub mod classify;
pub mod epoch;
pub mod index;
pub mod plan;
pub mod price;

pub use classify::{classify, ChainDealFields};
pub use epoch::{
    epoch_to_timestamp, epoch_to_unix, reference_epoch, timestamp_to_epoch, unix_to_epoch,
    RunClock, EPOCH_SECONDS, GENESIS_UNIX,
};
pub use index::{KnownDeals, PendingDealKey, PendingQueues, PieceSets, ReconcileIndex};
pub use plan::{ObservedDeal, PlanError, PlannedWrite};
pub use price::{normalize_price, PriceError};
