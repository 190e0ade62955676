use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use smx_schemas::{
    CarPiece, ChainEpoch, ChainUpdate, ClientMapping, DealRecord, KnownDeal, NewClientMapping,
    PendingDeal, VerifiedClient,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

mod clients;
mod deals;

pub const ENV_DB_URL: &str = "SMX_DATABASE_URL";

/// Connect to Postgres using SMX_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='deals'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_deals_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_deals_table: bool,
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Everything the reconciler reads from and writes to the deals and cars
/// collections.
#[async_trait::async_trait]
pub trait DealStore: Send + Sync {
    /// Deals without an on-chain id, oldest first; ties in insertion order.
    async fn load_pending_deals(&self) -> Result<Vec<PendingDeal>>;

    /// Deals that own an on-chain id.
    async fn load_known_deals(&self) -> Result<Vec<KnownDeal>>;

    /// Distinct `(piece_cid, protocol)` pairs from cars.
    async fn load_car_pieces(&self) -> Result<Vec<CarPiece>>;

    /// Write deal id, state, epochs and duration onto an existing record.
    async fn apply_chain_update(&self, record_id: Uuid, update: &ChainUpdate) -> Result<()>;

    async fn insert_deal(&self, record: &DealRecord) -> Result<()>;

    /// `active` with `end_epoch < reference_epoch` -> `expired`.
    async fn expire_active_deals(&self, reference_epoch: ChainEpoch) -> Result<u64>;

    /// `proposed`/`published` with `start_epoch < reference_epoch` or
    /// `created_at < created_before` -> `proposal_expired`.
    async fn expire_stale_proposals(
        &self,
        reference_epoch: ChainEpoch,
        created_before: DateTime<Utc>,
    ) -> Result<u64>;
}

#[async_trait::async_trait]
pub trait ClientMappingStore: Send + Sync {
    async fn load_client_mappings(&self) -> Result<Vec<ClientMapping>>;

    /// Persist a mapping. When either side already exists the stored row is
    /// returned unchanged.
    async fn insert_client_mapping(&self, mapping: &NewClientMapping) -> Result<ClientMapping>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait::async_trait]
pub trait VerifiedClientStore: Send + Sync {
    async fn upsert_verified_client(&self, client: &VerifiedClient) -> Result<UpsertOutcome>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn deal_id_to_db(deal_id: u64) -> Result<i64> {
    i64::try_from(deal_id).with_context(|| format!("deal id {deal_id} exceeds bigint range"))
}

fn deal_id_from_db(raw: i64) -> Result<u64> {
    u64::try_from(raw).with_context(|| format!("negative deal id {raw} in store"))
}
