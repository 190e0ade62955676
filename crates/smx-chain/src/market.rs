//! Wire shape of one `StateMarketDeals` entry.
//!
//! ```text
//! { "<deal id>": { "Proposal": { ... }, "State": { ... } }, ... }
//! ```
//!
//! Only the fields the reconciler reads are modelled; everything else is
//! ignored.

use serde::{Deserialize, Deserializer};
use smx_schemas::ChainEpoch;

/// One decoded `(deal id, deal)` pair from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub deal_id: u64,
    pub deal: MarketDeal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarketDeal {
    #[serde(rename = "Proposal")]
    pub proposal: DealProposal,
    #[serde(rename = "State")]
    pub state: MarketDealState,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealProposal {
    #[serde(rename = "PieceCID")]
    pub piece_cid: CidLink,
    pub piece_size: u64,
    #[serde(default)]
    pub verified_deal: bool,
    pub client: String,
    pub provider: String,
    #[serde(default)]
    pub label: String,
    #[serde(deserialize_with = "epoch_i32")]
    pub start_epoch: ChainEpoch,
    #[serde(deserialize_with = "epoch_i32")]
    pub end_epoch: ChainEpoch,
    pub storage_price_per_epoch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketDealState {
    #[serde(deserialize_with = "epoch_i32")]
    pub sector_start_epoch: ChainEpoch,
    #[serde(default, deserialize_with = "epoch_i32")]
    pub last_updated_epoch: ChainEpoch,
    #[serde(deserialize_with = "epoch_i32")]
    pub slash_epoch: ChainEpoch,
}

/// Chain epochs are 32-bit on the wire; anything wider is a decode error.
fn epoch_i32<'de, D>(deserializer: D) -> Result<ChainEpoch, D::Error>
where
    D: Deserializer<'de>,
{
    i32::deserialize(deserializer).map(ChainEpoch::from)
}

/// IPLD link form: `{"/": "baga..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CidLink {
    #[serde(rename = "/")]
    pub cid: String,
}

impl MarketDeal {
    pub fn piece_cid(&self) -> &str {
        &self.proposal.piece_cid.cid
    }
}
