//! YAML layering, canonical form and the secret-literal guard.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// String leaves starting with one of these are treated as pasted
/// credentials. Lotus API tokens are JWTs, hence `eyJ`.
const CREDENTIAL_PREFIXES: &[&str] = &[
    "eyJ",
    "-----BEGIN",
    "AKIA",
    "sk-",
    "sk_live",
    "sk_test",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

/// Shortest string the guard inspects.
const MIN_CREDENTIAL_LEN: usize = 8;

/// Parse each document and overlay it onto the previous ones.
/// Blank documents contribute nothing.
pub(crate) fn merge_documents(docs: &[&str]) -> Result<Value> {
    let mut merged = Value::Object(Map::new());
    for (i, doc) in docs.iter().enumerate() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(doc)
            .with_context(|| format!("config layer {i}: invalid yaml"))?;
        if yaml.is_null() {
            continue;
        }
        let json = serde_json::to_value(yaml)
            .with_context(|| format!("config layer {i}: not representable as json"))?;
        overlay(&mut merged, json);
    }
    Ok(merged)
}

/// Objects merge key by key; any other value replaces what was there.
pub(crate) fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                overlay(dst.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Compact JSON with keys in sorted order (serde_json's map is a BTreeMap).
pub(crate) fn canonical_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// JSON-pointer paths of every scalar leaf, sorted. Empty objects and arrays
/// have no leaves.
pub(crate) fn leaf_pointers(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];
    while let Some((path, v)) = stack.pop() {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    stack.push((format!("{path}/{token}"), child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    stack.push((format!("{path}/{i}"), child));
                }
            }
            scalar => {
                let path = if path.is_empty() { "/".to_string() } else { path };
                out.push((path, scalar));
            }
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn looks_like_credential(s: &str) -> bool {
    let t = s.trim();
    t.len() >= MIN_CREDENTIAL_LEN && CREDENTIAL_PREFIXES.iter().any(|p| t.starts_with(p))
}

/// The error names the pointer only; the value never leaves this function.
pub(crate) fn reject_credential_literals(v: &Value) -> Result<()> {
    for (pointer, leaf) in leaf_pointers(v) {
        if leaf.as_str().is_some_and(looks_like_credential) {
            bail!(
                "CONFIG_SECRET_DETECTED at {pointer}: config must name an env var, value=REDACTED"
            );
        }
    }
    Ok(())
}
