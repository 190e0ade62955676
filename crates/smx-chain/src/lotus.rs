//! Identity lookup over Lotus JSON-RPC 2.0.
//!
//! - actor id -> account key: `Filecoin.StateAccountKey([actorId, null])`
//! - account key -> actor id: `Filecoin.StateLookupID([accountKey, null])`
//!
//! An RPC error whose message contains "not found" means the address will
//! never resolve; callers cache that. Anything else is a real failure.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const METHOD_ACCOUNT_KEY: &str = "Filecoin.StateAccountKey";
const METHOD_LOOKUP_ID: &str = "Filecoin.StateLookupID";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The service says this address does not exist on chain.
    NotFound(String),
    /// Network or HTTP failure.
    Transport(String),
    /// JSON-RPC error other than "not found".
    Rpc { code: i64, message: String },
    /// Response payload could not be decoded.
    Decode(String),
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound(_))
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound(id) => write!(f, "address not found: {id}"),
            LookupError::Transport(msg) => write!(f, "transport error: {msg}"),
            LookupError::Rpc { code, message } => {
                write!(f, "rpc error code={code}: {message}")
            }
            LookupError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for LookupError {}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Remote identity lookup. Implementations do no caching.
#[async_trait::async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Long account key for a short actor id.
    async fn account_key(&self, actor_id: &str) -> Result<String, LookupError>;

    /// Short actor id for a long account key.
    async fn actor_id(&self, account_key: &str) -> Result<String, LookupError>;
}

// ---------------------------------------------------------------------------
// JSON-RPC client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: [Value; 2],
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

pub struct LotusRpcClient {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    next_id: AtomicU64,
}

impl fmt::Debug for LotusRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LotusRpcClient")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl LotusRpcClient {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("lotus http client build failed")?;
        Ok(Self {
            http,
            url: url.into(),
            token,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_address(&self, method: &'static str, addr: &str) -> Result<String, LookupError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: [Value::String(addr.to_string()), Value::Null],
        };

        let mut builder = self.http.post(&self.url).json(&req);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| LookupError::Transport(format!("{method}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LookupError::Transport(format!("{method}: read body: {e}")))?;

        // Lotus may answer RPC errors with a non-2xx status and a JSON-RPC
        // body, so try the body first.
        let parsed: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) if status.is_success() => {
                return Err(LookupError::Decode(format!("{method}: {e}")));
            }
            Err(_) => {
                return Err(LookupError::Transport(format!(
                    "{method}: http status={}",
                    status.as_u16()
                )));
            }
        };

        if let Some(err) = parsed.error {
            if err.message.to_ascii_lowercase().contains("not found") {
                return Err(LookupError::NotFound(addr.to_string()));
            }
            return Err(LookupError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        match parsed.result {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(other) => Err(LookupError::Decode(format!(
                "{method}: expected address string, got {other}"
            ))),
            None => Err(LookupError::Decode(format!("{method}: missing result"))),
        }
    }
}

#[async_trait::async_trait]
impl IdentityLookup for LotusRpcClient {
    async fn account_key(&self, actor_id: &str) -> Result<String, LookupError> {
        self.call_address(METHOD_ACCOUNT_KEY, actor_id).await
    }

    async fn actor_id(&self, account_key: &str) -> Result<String, LookupError> {
        self.call_address(METHOD_LOOKUP_ID, account_key).await
    }
}
