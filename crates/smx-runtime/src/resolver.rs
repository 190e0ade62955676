//! Client identity resolution with a run-scoped cache.
//!
//! A client appears on-chain either as a short actor id (`f0…`) or as a long
//! account key. Deals are matched on the actor id, so every client string is
//! resolved to a [`ClientMapping`] first.
//!
//! Cache rules:
//! - seeded from the persisted clients collection at construction
//! - positive results are stored under both sides and persisted
//! - "not found" is remembered for the rest of the run
//! - nothing is evicted
//!
//! One async mutex covers lookup, remote call, persist and insert, so two
//! concurrent resolutions of the same id never both hit the remote service.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use smx_chain::{IdentityLookup, LookupError};
use smx_db::ClientMappingStore;
use smx_schemas::{ClientMapping, IdentityKind, NewClientMapping};
use tokio::sync::Mutex;

#[derive(Debug)]
pub enum ResolveError {
    /// The lookup service does not know this id. Cached; callers fall back
    /// to the raw string.
    NotFound(String),
    /// Transport, RPC or persistence failure.
    Fatal(anyhow::Error),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound(id) => write!(f, "client identity not found: {id}"),
            ResolveError::Fatal(e) => write!(f, "client identity resolution failed: {e:#}"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::NotFound(_) => None,
            ResolveError::Fatal(e) => Some(e.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub cached_mappings: usize,
    pub unresolvable: usize,
    pub remote_calls: u64,
}

#[derive(Default)]
struct Cache {
    by_actor: HashMap<String, ClientMapping>,
    by_account: HashMap<String, ClientMapping>,
    unresolvable: HashSet<String>,
}

impl Cache {
    fn insert(&mut self, m: ClientMapping) {
        self.by_actor.insert(m.actor_id.clone(), m.clone());
        self.by_account.insert(m.account_key.clone(), m);
    }

    fn get(&self, id: &str) -> Option<&ClientMapping> {
        self.by_actor.get(id).or_else(|| self.by_account.get(id))
    }
}

pub struct IdentityResolver {
    lookup: Arc<dyn IdentityLookup>,
    store: Arc<dyn ClientMappingStore>,
    cache: Mutex<Cache>,
    remote_calls: AtomicU64,
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("remote_calls", &self.remote_calls.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Build with the cache seeded from `store`.
    pub async fn load(
        lookup: Arc<dyn IdentityLookup>,
        store: Arc<dyn ClientMappingStore>,
    ) -> Result<Self> {
        let mappings = store
            .load_client_mappings()
            .await
            .context("load persisted client mappings")?;
        tracing::debug!(mappings = mappings.len(), "identity cache seeded");
        Ok(Self::with_mappings(lookup, store, mappings))
    }

    pub fn with_mappings(
        lookup: Arc<dyn IdentityLookup>,
        store: Arc<dyn ClientMappingStore>,
        mappings: Vec<ClientMapping>,
    ) -> Self {
        let mut cache = Cache::default();
        for m in mappings {
            cache.insert(m);
        }
        Self {
            lookup,
            store,
            cache: Mutex::new(cache),
            remote_calls: AtomicU64::new(0),
        }
    }

    pub async fn resolve(&self, id: &str) -> Result<ClientMapping, ResolveError> {
        let mut cache = self.cache.lock().await;

        if cache.unresolvable.contains(id) {
            return Err(ResolveError::NotFound(id.to_string()));
        }
        if let Some(m) = cache.get(id) {
            return Ok(m.clone());
        }

        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        let kind = IdentityKind::of(id);
        let looked_up = match kind {
            IdentityKind::ActorId => self.lookup.account_key(id).await.map(|key| NewClientMapping {
                actor_id: id.to_string(),
                account_key: key,
            }),
            IdentityKind::AccountKey => self.lookup.actor_id(id).await.map(|actor| NewClientMapping {
                actor_id: actor,
                account_key: id.to_string(),
            }),
        };

        let new_mapping = match looked_up {
            Ok(m) => m,
            Err(LookupError::NotFound(_)) => {
                cache.unresolvable.insert(id.to_string());
                tracing::debug!(client = id, "client identity not found; cached");
                return Err(ResolveError::NotFound(id.to_string()));
            }
            Err(e) => {
                return Err(ResolveError::Fatal(
                    anyhow::Error::new(e).context(format!("lookup client identity {id}")),
                ));
            }
        };

        let stored = self
            .store
            .insert_client_mapping(&new_mapping)
            .await
            .with_context(|| format!("persist client mapping {id}"))
            .map_err(ResolveError::Fatal)?;

        cache.insert(stored.clone());
        // A conflicting stored pair still answers for the id that was asked.
        match kind {
            IdentityKind::ActorId => {
                cache.by_actor.insert(id.to_string(), stored.clone());
            }
            IdentityKind::AccountKey => {
                cache.by_account.insert(id.to_string(), stored.clone());
            }
        }
        Ok(stored)
    }

    pub async fn stats(&self) -> ResolverStats {
        let cache = self.cache.lock().await;
        ResolverStats {
            cached_mappings: cache.by_actor.len(),
            unresolvable: cache.unresolvable.len(),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
        }
    }
}
