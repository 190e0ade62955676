//! Command handler modules for smx-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod clients;
pub mod reconcile;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use smx_chain::LotusRpcClient;
use smx_config::secrets::{resolve_secrets, ResolvedSecrets};
use smx_config::{report_unused_keys, ConfigMode, LoadedConfig, SmxConfig, UnusedKeyPolicy};
use smx_db::PgStore;
use smx_reconcile::{epoch_to_timestamp, timestamp_to_epoch};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Everything a command needs from the layered config.
pub struct CommandConfig {
    pub loaded: LoadedConfig,
    pub settings: SmxConfig,
    pub secrets: ResolvedSecrets,
}

/// Load, check unused keys for `mode`, type, and resolve secrets.
pub fn load_config(
    config_paths: &[String],
    mode: ConfigMode,
    policy: UnusedKeyPolicy,
) -> Result<CommandConfig> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = smx_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(mode, &loaded.config_json, policy)?;
    if !report.is_clean() {
        tracing::warn!(
            mode = mode.as_str(),
            unused = report.unused_leaf_pointers.len(),
            "CONFIG_UNUSED_KEYS"
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            tracing::warn!(pointer = %p, "unused config key");
        }
    }

    let settings = loaded.settings()?;
    let secrets = resolve_secrets(&loaded.config_json)?;
    tracing::debug!(config_hash = %loaded.config_hash, secrets = ?secrets, "config loaded");

    Ok(CommandConfig {
        loaded,
        settings,
        secrets,
    })
}

pub async fn connect_store() -> Result<Arc<PgStore>> {
    let pool = smx_db::connect_from_env().await?;
    Ok(Arc::new(PgStore::new(pool)))
}

pub fn lotus_client(cfg: &CommandConfig) -> Result<LotusRpcClient> {
    LotusRpcClient::new(
        cfg.settings.lotus.rpc_url.clone(),
        cfg.secrets.lotus_token.clone(),
        Duration::from_secs(cfg.settings.lotus.timeout_secs),
    )
}

// ---------------------------------------------------------------------------
// epoch
// ---------------------------------------------------------------------------

pub fn epoch(at: Option<&str>, from: Option<i64>) -> Result<()> {
    if let Some(e) = from {
        let ts = epoch_to_timestamp(e)
            .with_context(|| format!("epoch {e} out of timestamp range"))?;
        println!("epoch={e}");
        println!("timestamp={}", ts.to_rfc3339());
        return Ok(());
    }

    let ts: DateTime<Utc> = match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --at '{raw}' (expected RFC3339)"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    println!("timestamp={}", ts.to_rfc3339());
    println!("epoch={}", timestamp_to_epoch(ts));
    Ok(())
}
