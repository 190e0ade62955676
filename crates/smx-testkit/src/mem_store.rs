use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use smx_db::{ClientMappingStore, DealStore, UpsertOutcome, VerifiedClientStore};
use smx_schemas::{
    CarPiece, ChainEpoch, ChainUpdate, ClientMapping, DealRecord, DealState, KnownDeal,
    NewClientMapping, PendingDeal, ProtocolVersion, Reporter, VerifiedClient,
};
use uuid::Uuid;

/// A `proposed` record as the deal-making front end would write it.
pub fn pending_record(
    client: &str,
    provider: &str,
    piece_cid: &str,
    created_at: DateTime<Utc>,
) -> DealRecord {
    DealRecord {
        id: Uuid::new_v4(),
        reporter: Reporter {
            protocol: ProtocolVersion::V2,
            instance_id: "instance-1".to_string(),
            ip: "10.0.0.1".to_string(),
        },
        created_at,
        client: client.to_string(),
        provider: provider.to_string(),
        label: String::new(),
        piece_cid: piece_cid.to_string(),
        piece_size: 1 << 30,
        state: DealState::Proposed,
        deal_id: None,
        start_epoch: None,
        end_epoch: None,
        sector_start_epoch: None,
        duration: 0,
        verified: false,
        price: 0.0,
    }
}

#[derive(Default)]
struct Inner {
    // Vec order is insertion order (the `seq` column).
    deals: Vec<DealRecord>,
    cars: Vec<CarPiece>,
    clients: Vec<ClientMapping>,
    verified: BTreeMap<i32, VerifiedClient>,
    deal_writes: u64,
    mapping_inserts: u64,
    fail_deal_writes: bool,
}

/// In-memory store. Enforces the same uniqueness rules as the Postgres
/// schema: one record per on-chain deal id, one mapping per actor id and per
/// account key.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_deal(&self, record: DealRecord) {
        self.lock().deals.push(record);
    }

    pub fn add_car(&self, piece_cid: &str, protocol: ProtocolVersion) {
        self.lock().cars.push(CarPiece {
            piece_cid: piece_cid.to_string(),
            protocol,
        });
    }

    pub fn add_mapping(&self, actor_id: &str, account_key: &str) -> ClientMapping {
        let m = ClientMapping {
            id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            account_key: account_key.to_string(),
        };
        self.lock().clients.push(m.clone());
        m
    }

    pub fn deals(&self) -> Vec<DealRecord> {
        self.lock().deals.clone()
    }

    pub fn deal(&self, id: Uuid) -> Option<DealRecord> {
        self.lock().deals.iter().find(|d| d.id == id).cloned()
    }

    pub fn deal_by_chain_id(&self, deal_id: u64) -> Option<DealRecord> {
        self.lock()
            .deals
            .iter()
            .find(|d| d.deal_id == Some(deal_id))
            .cloned()
    }

    pub fn client_mappings(&self) -> Vec<ClientMapping> {
        self.lock().clients.clone()
    }

    pub fn verified_clients(&self) -> Vec<VerifiedClient> {
        self.lock().verified.values().cloned().collect()
    }

    /// Updates, inserts and swept rows on the deals collection.
    pub fn deal_writes(&self) -> u64 {
        self.lock().deal_writes
    }

    pub fn mapping_inserts(&self) -> u64 {
        self.lock().mapping_inserts
    }

    pub fn reset_counters(&self) {
        let mut g = self.lock();
        g.deal_writes = 0;
        g.mapping_inserts = 0;
    }

    /// Make every subsequent deal write fail.
    pub fn fail_deal_writes(&self) {
        self.lock().fail_deal_writes = true;
    }
}

#[async_trait::async_trait]
impl DealStore for MemStore {
    async fn load_pending_deals(&self) -> Result<Vec<PendingDeal>> {
        let mut out: Vec<PendingDeal> = self
            .lock()
            .deals
            .iter()
            .filter(|d| d.deal_id.is_none())
            .map(|d| PendingDeal {
                record_id: d.id,
                client: d.client.clone(),
                provider: d.provider.clone(),
                piece_cid: d.piece_cid.clone(),
                label: d.label.clone(),
                created_at: d.created_at,
            })
            .collect();
        out.sort_by_key(|d| d.created_at);
        Ok(out)
    }

    async fn load_known_deals(&self) -> Result<Vec<KnownDeal>> {
        Ok(self
            .lock()
            .deals
            .iter()
            .filter_map(|d| {
                d.deal_id.map(|deal_id| KnownDeal {
                    deal_id,
                    record_id: d.id,
                    state: d.state,
                })
            })
            .collect())
    }

    async fn load_car_pieces(&self) -> Result<Vec<CarPiece>> {
        let mut out: Vec<CarPiece> = Vec::new();
        for c in &self.lock().cars {
            if !out.contains(c) {
                out.push(c.clone());
            }
        }
        Ok(out)
    }

    async fn apply_chain_update(&self, record_id: Uuid, update: &ChainUpdate) -> Result<()> {
        let mut g = self.lock();
        if g.fail_deal_writes {
            bail!("apply_chain_update failed record_id={record_id}: injected failure");
        }
        if g
            .deals
            .iter()
            .any(|d| d.id != record_id && d.deal_id == Some(update.deal_id))
        {
            bail!("apply_chain_update: deal id {} already bound", update.deal_id);
        }
        let rec = g
            .deals
            .iter_mut()
            .find(|d| d.id == record_id)
            .ok_or_else(|| anyhow!("apply_chain_update: record {record_id} not found"))?;
        rec.deal_id = Some(update.deal_id);
        rec.state = update.state;
        rec.start_epoch = Some(update.start_epoch);
        rec.end_epoch = Some(update.end_epoch);
        rec.sector_start_epoch = Some(update.sector_start_epoch);
        rec.duration = update.duration;
        g.deal_writes += 1;
        Ok(())
    }

    async fn insert_deal(&self, record: &DealRecord) -> Result<()> {
        let mut g = self.lock();
        if g.fail_deal_writes {
            bail!("insert_deal failed id={}: injected failure", record.id);
        }
        if g.deals.iter().any(|d| {
            d.id == record.id || (record.deal_id.is_some() && d.deal_id == record.deal_id)
        }) {
            bail!("insert_deal: duplicate id={} deal_id={:?}", record.id, record.deal_id);
        }
        g.deals.push(record.clone());
        g.deal_writes += 1;
        Ok(())
    }

    async fn expire_active_deals(&self, reference_epoch: ChainEpoch) -> Result<u64> {
        let mut g = self.lock();
        let mut n = 0u64;
        for d in g.deals.iter_mut() {
            if d.state == DealState::Active && d.end_epoch.is_some_and(|e| e < reference_epoch) {
                d.state = DealState::Expired;
                n += 1;
            }
        }
        g.deal_writes += n;
        Ok(n)
    }

    async fn expire_stale_proposals(
        &self,
        reference_epoch: ChainEpoch,
        created_before: DateTime<Utc>,
    ) -> Result<u64> {
        let mut g = self.lock();
        let mut n = 0u64;
        for d in g.deals.iter_mut() {
            let open = matches!(d.state, DealState::Proposed | DealState::Published);
            let stale = d.start_epoch.is_some_and(|s| s < reference_epoch)
                || d.created_at < created_before;
            if open && stale {
                d.state = DealState::ProposalExpired;
                n += 1;
            }
        }
        g.deal_writes += n;
        Ok(n)
    }
}

#[async_trait::async_trait]
impl ClientMappingStore for MemStore {
    async fn load_client_mappings(&self) -> Result<Vec<ClientMapping>> {
        Ok(self.lock().clients.clone())
    }

    async fn insert_client_mapping(&self, mapping: &NewClientMapping) -> Result<ClientMapping> {
        let mut g = self.lock();
        if let Some(existing) = g
            .clients
            .iter()
            .find(|c| c.actor_id == mapping.actor_id || c.account_key == mapping.account_key)
        {
            return Ok(existing.clone());
        }
        let stored = ClientMapping {
            id: Uuid::new_v4(),
            actor_id: mapping.actor_id.clone(),
            account_key: mapping.account_key.clone(),
        };
        g.clients.push(stored.clone());
        g.mapping_inserts += 1;
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl VerifiedClientStore for MemStore {
    async fn upsert_verified_client(&self, client: &VerifiedClient) -> Result<UpsertOutcome> {
        Ok(match self.lock().verified.insert(client.id, client.clone()) {
            None => UpsertOutcome::Inserted,
            Some(_) => UpsertOutcome::Updated,
        })
    }
}
