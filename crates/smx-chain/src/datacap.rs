//! Verified-clients feed.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use smx_schemas::VerifiedClient;

#[async_trait::async_trait]
pub trait VerifiedClientFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<VerifiedClient>>;
}

/// HTTPS GET returning either `{"data": [...]}` or a bare array.
#[derive(Debug, Clone)]
pub struct DatacapFeed {
    http: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody {
    Wrapped { data: Vec<VerifiedClient> },
    Bare(Vec<VerifiedClient>),
}

impl FeedBody {
    fn into_clients(self) -> Vec<VerifiedClient> {
        match self {
            FeedBody::Wrapped { data } => data,
            FeedBody::Bare(v) => v,
        }
    }
}

impl DatacapFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("datacap http client build failed")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl VerifiedClientFeed for DatacapFeed {
    async fn fetch(&self) -> Result<Vec<VerifiedClient>> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("verified clients request failed: {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(
                "verified clients http error status={} url={}",
                status.as_u16(),
                self.url
            ));
        }

        let body: FeedBody = resp
            .json()
            .await
            .context("verified clients response json decode failed")?;
        Ok(body.into_clients())
    }
}
