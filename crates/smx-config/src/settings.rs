//! Typed view over the merged config JSON.
//!
//! Every field has a default, so an empty config is valid and points at the
//! public mainnet endpoints.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SNAPSHOT_URL: &str = "https://marketdeals.s3.amazonaws.com/StateMarketDeals.json.zst";
pub const DEFAULT_LOTUS_RPC_URL: &str = "https://api.node.glif.io/";
pub const DEFAULT_DATACAP_URL: &str = "https://api.datacapstats.io/api/getVerifiedClients";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmxConfig {
    pub snapshot: SnapshotSettings,
    pub lotus: LotusSettings,
    pub datacap: DatacapSettings,
    pub reconcile: ReconcileSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotCompression {
    /// zstd when the source name ends in `.zst`, plain JSON otherwise.
    #[default]
    Auto,
    Zstd,
    None,
}

impl SnapshotCompression {
    /// Resolve `Auto` against a URL or file path.
    pub fn is_zstd_for(&self, source: &str) -> bool {
        match self {
            SnapshotCompression::Zstd => true,
            SnapshotCompression::None => false,
            SnapshotCompression::Auto => {
                let path = source.split(['?', '#']).next().unwrap_or(source);
                path.ends_with(".zst")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotSettings {
    pub url: String,
    pub compression: SnapshotCompression,
    /// Entries buffered between the decoder thread and the reconciler.
    pub channel_capacity: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SNAPSHOT_URL.to_string(),
            compression: SnapshotCompression::Auto,
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LotusSettings {
    pub rpc_url: String,
    /// NAME of the env var holding a bearer token. Unset means no auth header.
    pub token_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LotusSettings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_LOTUS_RPC_URL.to_string(),
            token_env: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatacapSettings {
    pub url: String,
    pub sync_before_reconcile: bool,
    pub timeout_secs: u64,
}

impl Default for DatacapSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATACAP_URL.to_string(),
            sync_before_reconcile: true,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileSettings {
    pub reference_lag_hours: i64,
    pub proposal_max_age_days: i64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            reference_lag_hours: 24,
            proposal_max_age_days: 30,
        }
    }
}

/// Upper bound for `reconcile.reference_lag_hours` (one year).
pub const MAX_REFERENCE_LAG_HOURS: i64 = 24 * 365;

/// Upper bound for `reconcile.proposal_max_age_days` (ten years).
pub const MAX_PROPOSAL_MAX_AGE_DAYS: i64 = 3_650;

impl SmxConfig {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let cfg: SmxConfig = serde_json::from_value(config_json.clone())
            .context("config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot.url.trim().is_empty() {
            bail!("CONFIG_INVALID: snapshot.url must not be empty");
        }
        if self.snapshot.channel_capacity == 0 {
            bail!("CONFIG_INVALID: snapshot.channel_capacity must be > 0");
        }
        if self.lotus.rpc_url.trim().is_empty() {
            bail!("CONFIG_INVALID: lotus.rpc_url must not be empty");
        }
        if self.lotus.timeout_secs == 0 || self.datacap.timeout_secs == 0 {
            bail!("CONFIG_INVALID: timeouts must be > 0");
        }
        if !(0..=MAX_REFERENCE_LAG_HOURS).contains(&self.reconcile.reference_lag_hours) {
            bail!(
                "CONFIG_INVALID: reconcile.reference_lag_hours must be in 0..={MAX_REFERENCE_LAG_HOURS} (got {})",
                self.reconcile.reference_lag_hours
            );
        }
        if !(1..=MAX_PROPOSAL_MAX_AGE_DAYS).contains(&self.reconcile.proposal_max_age_days) {
            bail!(
                "CONFIG_INVALID: reconcile.proposal_max_age_days must be in 1..={MAX_PROPOSAL_MAX_AGE_DAYS} (got {})",
                self.reconcile.proposal_max_age_days
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = SmxConfig::from_config_json(&serde_json::json!({})).unwrap();
        assert_eq!(cfg, SmxConfig::default());
        assert_eq!(cfg.snapshot.channel_capacity, 256);
        assert_eq!(cfg.reconcile.reference_lag_hours, 24);
        assert_eq!(cfg.reconcile.proposal_max_age_days, 30);
        assert!(cfg.datacap.sync_before_reconcile);
        assert!(cfg.lotus.token_env.is_none());
    }

    #[test]
    fn compression_auto_follows_suffix() {
        let auto = SnapshotCompression::Auto;
        assert!(auto.is_zstd_for(DEFAULT_SNAPSHOT_URL));
        assert!(auto.is_zstd_for("/tmp/deals.json.zst"));
        assert!(auto.is_zstd_for("https://h/x.json.zst?sig=abc"));
        assert!(!auto.is_zstd_for("/tmp/deals.json"));
        assert!(SnapshotCompression::Zstd.is_zstd_for("plain.json"));
        assert!(!SnapshotCompression::None.is_zstd_for("x.zst"));
    }

    #[test]
    fn unknown_section_key_rejected() {
        let err = SmxConfig::from_config_json(&serde_json::json!({
            "lotus": {"rpc_url": "http://x", "typo_field": 1}
        }))
        .unwrap_err();
        assert!(format!("{err:#}").contains("typo_field"));
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = SmxConfig::from_config_json(&serde_json::json!({
            "snapshot": {"channel_capacity": 0}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn oversized_durations_rejected() {
        let err = SmxConfig::from_config_json(&serde_json::json!({
            "reconcile": {"reference_lag_hours": 1_000_000_000_000_000_i64}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"), "{err}");
        assert!(err.to_string().contains("reference_lag_hours"), "{err}");

        let err = SmxConfig::from_config_json(&serde_json::json!({
            "reconcile": {"proposal_max_age_days": i64::MAX}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("proposal_max_age_days"), "{err}");

        let edge = SmxConfig::from_config_json(&serde_json::json!({
            "reconcile": {
                "reference_lag_hours": MAX_REFERENCE_LAG_HOURS,
                "proposal_max_age_days": MAX_PROPOSAL_MAX_AGE_DAYS
            }
        }))
        .unwrap();
        assert_eq!(edge.reconcile.reference_lag_hours, MAX_REFERENCE_LAG_HOURS);
    }
}
