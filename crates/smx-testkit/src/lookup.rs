use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use smx_chain::{IdentityLookup, LookupError};

#[derive(Default)]
struct Pairs {
    account_by_actor: HashMap<String, String>,
    actor_by_account: HashMap<String, String>,
    transport_failures: HashSet<String>,
}

/// Identity lookup backed by a fixed table. Unknown ids are `NotFound`.
#[derive(Default)]
pub struct FakeLookup {
    pairs: Mutex<Pairs>,
    calls: AtomicU64,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(actor_id: &str, account_key: &str) -> Self {
        let l = Self::new();
        l.add_pair(actor_id, account_key);
        l
    }

    fn pairs(&self) -> std::sync::MutexGuard<'_, Pairs> {
        match self.pairs.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_pair(&self, actor_id: &str, account_key: &str) {
        let mut p = self.pairs();
        p.account_by_actor
            .insert(actor_id.to_string(), account_key.to_string());
        p.actor_by_account
            .insert(account_key.to_string(), actor_id.to_string());
    }

    /// Lookups of `id` fail with a transport error.
    pub fn fail_transport(&self, id: &str) {
        self.pairs().transport_failures.insert(id.to_string());
    }

    /// Remote calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, id: &str, actor_side: bool) -> Result<String, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let p = self.pairs();
        if p.transport_failures.contains(id) {
            return Err(LookupError::Transport(format!("connection refused looking up {id}")));
        }
        let table = if actor_side {
            &p.account_by_actor
        } else {
            &p.actor_by_account
        };
        table
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(id.to_string()))
    }
}

#[async_trait::async_trait]
impl IdentityLookup for FakeLookup {
    async fn account_key(&self, actor_id: &str) -> Result<String, LookupError> {
        self.answer(actor_id, true)
    }

    async fn actor_id(&self, account_key: &str) -> Result<String, LookupError> {
        self.answer(account_key, false)
    }
}
