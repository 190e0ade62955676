//! In-memory fakes and fixtures for scenario tests.
//!
//! - [`MemStore`]: every store trait, with write counters
//! - [`FakeLookup`]: call-counting identity lookup
//! - [`SnapshotFixture`] / [`StaticSnapshotSource`]: snapshot bytes built in
//!   memory, optionally zstd-compressed
//! - [`StaticFeed`]: fixed verified-clients feed

mod feed;
mod lookup;
mod mem_store;
mod snapshot;

pub use feed::StaticFeed;
pub use lookup::FakeLookup;
pub use mem_store::{pending_record, MemStore};
pub use snapshot::{FixtureDeal, SnapshotFixture, StaticSnapshotSource};

use chrono::{DateTime, Utc};

/// Fixed wall clock used across scenarios.
pub fn fixed_now() -> DateTime<Utc> {
    // 2024-03-01T00:00:00Z
    DateTime::<Utc>::from_timestamp(1_709_251_200, 0).unwrap_or_default()
}
