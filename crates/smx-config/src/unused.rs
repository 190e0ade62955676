//! Which config keys each command actually reads.
//!
//! A command declares the JSON-pointer prefixes it consumes. Any scalar leaf
//! outside those prefixes is unused: most often a typo or a key left behind
//! after a rename.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::layers::leaf_pointers;

/// Which command is reading the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Reconcile,
    ClientSync,
    Resolve,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Reconcile => "RECONCILE",
            ConfigMode::ClientSync => "CLIENT_SYNC",
            ConfigMode::Resolve => "RESOLVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Normalized, sorted.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// `reconcile` reads every section (client sync runs first unless disabled),
/// `clients sync` only `/datacap`, `resolve` only `/lotus`.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Reconcile => &["/snapshot", "/lotus", "/datacap", "/reconcile"],
        ConfigMode::ClientSync => &["/datacap"],
        ConfigMode::Resolve => &["/lotus"],
    }
}

/// With `Fail`, unused keys are an error. With `Warn` the report is returned
/// for the caller to log.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for_mode(mode)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();

    let unused: Vec<String> = leaf_pointers(config_json)
        .into_iter()
        .map(|(pointer, _)| pointer)
        .filter(|leaf| !consumed.iter().any(|prefix| is_under(prefix, leaf)))
        .collect();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes: consumed.into_iter().collect(),
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(12)
            .map(|s| s.as_str())
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS mode={} count={}: {}",
            report.mode,
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }

    Ok(report)
}

/// Leading `/`, no trailing `/`; empty means the root.
fn normalize_pointer(p: &str) -> String {
    let t = p.trim().trim_end_matches('/');
    if t.is_empty() {
        "/".to_string()
    } else if t.starts_with('/') {
        t.to_string()
    } else {
        format!("/{t}")
    }
}

/// Segment-aware: `/lotus` covers `/lotus/rpc_url` but not `/lotus_extra`.
fn is_under(prefix: &str, leaf: &str) -> bool {
    prefix == "/"
        || leaf == prefix
        || leaf
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
