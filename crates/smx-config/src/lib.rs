//! smx-config
//!
//! Layered YAML configuration for the `smx` commands.
//!
//! - layers merge in order, later layers override earlier ones
//! - the merged document is hashed in canonical form (sorted keys, compact)
//! - string values that look like credentials abort loading; config carries
//!   env var NAMES only (see [`secrets`])
//! - each command checks for keys it does not read (see [`report_unused_keys`])

use std::fs;

use anyhow::{Context, Result};
use serde_json::Value;

mod layers;
pub mod secrets;
pub mod settings;
mod unused;

pub use settings::{
    DatacapSettings, LotusSettings, ReconcileSettings, SmxConfig, SnapshotCompression,
    SnapshotSettings,
};
pub use unused::{
    consumed_pointers_for_mode, report_unused_keys, ConfigMode, UnusedKeyPolicy, UnusedKeyReport,
};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// sha256 hex of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view with defaults filled in for everything not set.
    pub fn settings(&self) -> Result<SmxConfig> {
        SmxConfig::from_config_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read config layer: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let merged = layers::merge_documents(yaml_docs)?;
    layers::reject_credential_literals(&merged)?;

    let canonical_json = layers::canonical_json(&merged)?;
    Ok(LoadedConfig {
        config_hash: layers::sha256_hex(canonical_json.as_bytes()),
        canonical_json,
        config_json: merged,
    })
}
