//! Streaming decoder for the market deal snapshot.
//!
//! The snapshot is a single JSON object with millions of keys. It is never
//! materialized: one blocking worker reads it incrementally and pushes each
//! `(deal id, deal)` pair into a bounded channel. The consumer pulls entries
//! with [`SnapshotStream::next`]. The stream is single-pass.

use std::fmt;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::Deserializer as _;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::market::{MarketDeal, SnapshotEntry};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

const READ_BUFFER_BYTES: usize = 1 << 20;

/// Boxed reader handed to the decoder thread.
pub type SnapshotReader = Box<dyn Read + Send>;

/// A lazily decoded, single-pass sequence of snapshot entries.
pub struct SnapshotStream {
    rx: mpsc::Receiver<SnapshotEntry>,
    producer: Option<JoinHandle<Result<u64>>>,
    received: u64,
}

impl fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("received", &self.received)
            .field("producer_running", &self.producer.is_some())
            .finish()
    }
}

impl SnapshotStream {
    /// Run `open` on a blocking worker and decode whatever it returns.
    ///
    /// Errors from `open` surface on the first call to [`next`](Self::next).
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(capacity: usize, zstd: bool, open: F) -> Self
    where
        F: FnOnce() -> Result<SnapshotReader> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let producer = tokio::task::spawn_blocking(move || {
            let reader = open()?;
            if zstd {
                let decoder = zstd::stream::read::Decoder::new(reader)
                    .context("zstd decoder init failed")?;
                decode_into(decoder, &tx)
            } else {
                decode_into(reader, &tx)
            }
        });
        Self {
            rx,
            producer: Some(producer),
            received: 0,
        }
    }

    /// Decode plain JSON from `reader`.
    pub fn from_reader<R>(reader: R, capacity: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::spawn(capacity, false, move || Ok(Box::new(reader) as SnapshotReader))
    }

    /// Decode zstd-compressed JSON from `reader`.
    pub fn from_zstd_reader<R>(reader: R, capacity: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::spawn(capacity, true, move || Ok(Box::new(reader) as SnapshotReader))
    }

    /// Next entry, `Ok(None)` once the snapshot is exhausted.
    ///
    /// A decode or transport failure in the worker is returned here once the
    /// entries decoded before it have been drained.
    pub async fn next(&mut self) -> Result<Option<SnapshotEntry>> {
        if let Some(entry) = self.rx.recv().await {
            self.received += 1;
            return Ok(Some(entry));
        }
        if let Some(handle) = self.producer.take() {
            let decoded = handle
                .await
                .map_err(|e| anyhow!("snapshot decoder task failed: {e}"))??;
            if decoded != self.received {
                return Err(anyhow!(
                    "snapshot decoder reported {decoded} entries but {} were received",
                    self.received
                ));
            }
            tracing::debug!(entries = decoded, "snapshot stream complete");
        }
        Ok(None)
    }

    /// Entries handed to the consumer so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Where a snapshot comes from. Each `open` starts a fresh pass.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// For logs.
    fn describe(&self) -> String;

    async fn open(&self) -> Result<SnapshotStream>;
}

/// HTTPS download, decoded while it streams in.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    url: String,
    zstd: bool,
    capacity: usize,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, zstd: bool, capacity: usize) -> Self {
        Self {
            url: url.into(),
            zstd,
            capacity,
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn describe(&self) -> String {
        format!("url={} zstd={}", self.url, self.zstd)
    }

    async fn open(&self) -> Result<SnapshotStream> {
        let url = self.url.clone();
        Ok(SnapshotStream::spawn(self.capacity, self.zstd, move || {
            // The blocking client defaults to a 30s total timeout; the download
            // routinely takes longer.
            let client = reqwest::blocking::Client::builder()
                .timeout(None)
                .build()
                .context("snapshot http client build failed")?;
            let resp = client
                .get(&url)
                .send()
                .with_context(|| format!("snapshot request failed: {url}"))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(anyhow!(
                    "snapshot http error status={} url={}",
                    status.as_u16(),
                    url
                ));
            }
            Ok(Box::new(resp) as SnapshotReader)
        }))
    }
}

/// Local file, same decoder.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
    zstd: bool,
    capacity: usize,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>, zstd: bool, capacity: usize) -> Self {
        Self {
            path: path.into(),
            zstd,
            capacity,
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for FileSnapshotSource {
    fn describe(&self) -> String {
        format!("file={} zstd={}", self.path.display(), self.zstd)
    }

    async fn open(&self) -> Result<SnapshotStream> {
        let path = self.path.clone();
        Ok(SnapshotStream::spawn(self.capacity, self.zstd, move || {
            let f = std::fs::File::open(&path)
                .with_context(|| format!("failed to open snapshot file: {}", path.display()))?;
            Ok(Box::new(f) as SnapshotReader)
        }))
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

const CONSUMER_GONE: &str = "snapshot consumer dropped";

fn decode_into<R: Read>(reader: R, tx: &mpsc::Sender<SnapshotEntry>) -> Result<u64> {
    let mut de = serde_json::Deserializer::from_reader(BufReader::with_capacity(
        READ_BUFFER_BYTES,
        reader,
    ));
    let count = (&mut de)
        .deserialize_map(EntryVisitor { tx })
        .context("snapshot decode failed")?;
    de.end().context("trailing data after snapshot object")?;
    Ok(count)
}

struct EntryVisitor<'a> {
    tx: &'a mpsc::Sender<SnapshotEntry>,
}

impl<'de, 'a> Visitor<'de> for EntryVisitor<'a> {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object keyed by decimal deal id")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<u64, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut count: u64 = 0;
        while let Some(key) = map.next_key::<String>()? {
            let deal_id: u64 = key
                .parse()
                .map_err(|_| custom::<A>(format!("invalid deal id key '{key}'")))?;
            let deal: MarketDeal = map
                .next_value()
                .map_err(|e| custom::<A>(format!("deal {deal_id}: {e}")))?;
            self.tx
                .blocking_send(SnapshotEntry { deal_id, deal })
                .map_err(|_| custom::<A>(CONSUMER_GONE))?;
            count += 1;
        }
        Ok(count)
    }
}

fn custom<'de, A: MapAccess<'de>>(msg: impl fmt::Display) -> A::Error {
    <A::Error as de::Error>::custom(msg)
}
