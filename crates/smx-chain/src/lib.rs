//! smx-chain
//!
//! Remote collaborators of the reconciler:
//! - the market deal snapshot (one very large JSON object, usually zstd) and
//!   its streaming decoder
//! - the identity lookup JSON-RPC service
//! - the verified-clients feed
//!
//! No persistence here.

pub mod datacap;
pub mod lotus;
pub mod market;
pub mod snapshot;

pub use datacap::{DatacapFeed, VerifiedClientFeed};
pub use lotus::{IdentityLookup, LookupError, LotusRpcClient};
pub use market::{CidLink, DealProposal, MarketDeal, MarketDealState, SnapshotEntry};
pub use snapshot::{
    FileSnapshotSource, HttpSnapshotSource, SnapshotSource, SnapshotStream,
    DEFAULT_CHANNEL_CAPACITY,
};
