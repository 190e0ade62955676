use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use smx_chain::{SnapshotSource, SnapshotStream, DEFAULT_CHANNEL_CAPACITY};
use smx_schemas::ChainEpoch;

/// One snapshot deal with test-friendly defaults: 1 GiB piece, epochs
/// 100..200, not sealed, not slashed, zero price.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDeal {
    pub client: String,
    pub provider: String,
    pub piece_cid: String,
    pub piece_size: u64,
    pub verified: bool,
    pub label: String,
    pub start_epoch: ChainEpoch,
    pub end_epoch: ChainEpoch,
    pub sector_start_epoch: ChainEpoch,
    pub slash_epoch: ChainEpoch,
    pub price: String,
}

impl FixtureDeal {
    pub fn new(client: &str, provider: &str, piece_cid: &str) -> Self {
        Self {
            client: client.to_string(),
            provider: provider.to_string(),
            piece_cid: piece_cid.to_string(),
            piece_size: 1 << 30,
            verified: false,
            label: String::new(),
            start_epoch: 100,
            end_epoch: 200,
            sector_start_epoch: -1,
            slash_epoch: -1,
            price: "0".to_string(),
        }
    }

    pub fn epochs(mut self, start: ChainEpoch, end: ChainEpoch) -> Self {
        self.start_epoch = start;
        self.end_epoch = end;
        self
    }

    pub fn sealed_at(mut self, epoch: ChainEpoch) -> Self {
        self.sector_start_epoch = epoch;
        self
    }

    pub fn slashed_at(mut self, epoch: ChainEpoch) -> Self {
        self.slash_epoch = epoch;
        self
    }

    pub fn price(mut self, attofil_per_epoch: &str) -> Self {
        self.price = attofil_per_epoch.to_string();
        self
    }

    pub fn piece_size(mut self, bytes: u64) -> Self {
        self.piece_size = bytes;
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "Proposal": {
                "PieceCID": { "/": self.piece_cid },
                "PieceSize": self.piece_size,
                "VerifiedDeal": self.verified,
                "Client": self.client,
                "Provider": self.provider,
                "Label": self.label,
                "StartEpoch": self.start_epoch,
                "EndEpoch": self.end_epoch,
                "StoragePricePerEpoch": self.price,
                "ProviderCollateral": "0",
                "ClientCollateral": "0"
            },
            "State": {
                "SectorStartEpoch": self.sector_start_epoch,
                "LastUpdatedEpoch": -1,
                "SlashEpoch": self.slash_epoch
            }
        })
    }
}

/// Snapshot document built entry by entry. Keys keep insertion order so the
/// decoder sees them exactly as added.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFixture {
    entries: Vec<(String, Value)>,
}

impl SnapshotFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deal(mut self, deal_id: u64, deal: FixtureDeal) -> Self {
        self.entries.push((deal_id.to_string(), deal.to_json()));
        self
    }

    /// Arbitrary key/value, for malformed-input scenarios.
    pub fn raw_entry(mut self, key: &str, value: Value) -> Self {
        self.entries.push((key.to_string(), value));
        self
    }

    pub fn to_json_bytes(&self) -> Vec<u8> {
        let mut out = String::from("{");
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&Value::String(k.clone()).to_string());
            out.push(':');
            out.push_str(&v.to_string());
        }
        out.push('}');
        out.into_bytes()
    }

    pub fn to_zstd_bytes(&self) -> Result<Vec<u8>> {
        zstd::stream::encode_all(Cursor::new(self.to_json_bytes()), 3)
            .context("zstd encode fixture failed")
    }

    pub fn source(&self) -> StaticSnapshotSource {
        StaticSnapshotSource::new(self.to_json_bytes(), false)
    }

    pub fn zstd_source(&self) -> Result<StaticSnapshotSource> {
        Ok(StaticSnapshotSource::new(self.to_zstd_bytes()?, true))
    }
}

/// Serves the same bytes on every `open`.
#[derive(Debug)]
pub struct StaticSnapshotSource {
    bytes: Vec<u8>,
    zstd: bool,
    opens: AtomicU64,
}

impl StaticSnapshotSource {
    pub fn new(bytes: Vec<u8>, zstd: bool) -> Self {
        Self {
            bytes,
            zstd,
            opens: AtomicU64::new(0),
        }
    }

    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SnapshotSource for StaticSnapshotSource {
    fn describe(&self) -> String {
        format!("static bytes={} zstd={}", self.bytes.len(), self.zstd)
    }

    async fn open(&self) -> Result<SnapshotStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let reader = Cursor::new(self.bytes.clone());
        Ok(if self.zstd {
            SnapshotStream::from_zstd_reader(reader, DEFAULT_CHANNEL_CAPACITY)
        } else {
            SnapshotStream::from_reader(reader, DEFAULT_CHANNEL_CAPACITY)
        })
    }
}
