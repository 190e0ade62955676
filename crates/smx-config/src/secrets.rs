//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (e.g. `lotus.token_env: "LOTUS_TOKEN"`).
//! Callers invoke [`resolve_secrets`] once at startup and pass the result to
//! constructors. `Debug` redacts values; errors name the variable, never the
//! value.

use anyhow::{bail, Result};
use serde_json::Value;

/// All runtime-resolved secrets for one invocation.
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Bearer token for the identity lookup RPC. `None` when no env var name
    /// is configured.
    pub lotus_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("lotus_token", &self.lotus_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Env var name configured at `pointer`, ignoring blanks.
fn env_name_at<'a>(config: &'a Value, pointer: &str) -> Option<&'a str> {
    config
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Value of `name`, treating blank as unset.
fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve secrets named by the config.
///
/// A configured `/lotus/token_env` whose variable is unset or blank is an
/// error. No configured name means anonymous RPC.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let lotus_token = match env_name_at(config_json, "/lotus/token_env") {
        None => None,
        Some(name) => match non_blank_env(name) {
            Some(token) => Some(token),
            None => bail!("SECRETS_MISSING: lotus.token_env names '{name}', which is unset or blank"),
        },
    };
    Ok(ResolvedSecrets { lotus_token })
}
