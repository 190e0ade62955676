use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use smx_schemas::{
    CarPiece, ChainEpoch, ChainUpdate, DealRecord, DealState, KnownDeal, PendingDeal,
    ProtocolVersion,
};
use sqlx::Row;
use uuid::Uuid;

use crate::{deal_id_from_db, deal_id_to_db, DealStore, PgStore};

#[async_trait::async_trait]
impl DealStore for PgStore {
    async fn load_pending_deals(&self) -> Result<Vec<PendingDeal>> {
        let rows = sqlx::query(
            r#"
            select id, client, provider, piece_cid, label, created_at
            from deals
            where deal_id is null
            order by created_at asc, seq asc
            "#,
        )
        .fetch_all(self.pool())
        .await
        .context("load_pending_deals failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(PendingDeal {
                record_id: row.try_get("id")?,
                client: row.try_get("client")?,
                provider: row.try_get("provider")?,
                piece_cid: row.try_get("piece_cid")?,
                label: row.try_get("label")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(out)
    }

    async fn load_known_deals(&self) -> Result<Vec<KnownDeal>> {
        let rows = sqlx::query(
            r#"
            select id, deal_id, state
            from deals
            where deal_id is not null
            "#,
        )
        .fetch_all(self.pool())
        .await
        .context("load_known_deals failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let state: String = row.try_get("state")?;
            out.push(KnownDeal {
                deal_id: deal_id_from_db(row.try_get("deal_id")?)?,
                record_id: row.try_get("id")?,
                state: DealState::parse(&state)?,
            });
        }
        Ok(out)
    }

    async fn load_car_pieces(&self) -> Result<Vec<CarPiece>> {
        let rows = sqlx::query(
            r#"
            select distinct piece_cid, is_v1
            from cars
            "#,
        )
        .fetch_all(self.pool())
        .await
        .context("load_car_pieces failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(CarPiece {
                piece_cid: row.try_get("piece_cid")?,
                protocol: ProtocolVersion::from_is_v1(row.try_get("is_v1")?),
            });
        }
        Ok(out)
    }

    async fn apply_chain_update(&self, record_id: Uuid, update: &ChainUpdate) -> Result<()> {
        let res = sqlx::query(
            r#"
            update deals
            set state = $2,
                deal_id = $3,
                start_epoch = $4,
                end_epoch = $5,
                sector_start_epoch = $6,
                duration = $7
            where id = $1
            "#,
        )
        .bind(record_id)
        .bind(update.state.as_str())
        .bind(deal_id_to_db(update.deal_id)?)
        .bind(update.start_epoch)
        .bind(update.end_epoch)
        .bind(update.sector_start_epoch)
        .bind(update.duration)
        .execute(self.pool())
        .await
        .with_context(|| {
            format!(
                "apply_chain_update failed record_id={record_id} deal_id={}",
                update.deal_id
            )
        })?;

        if res.rows_affected() != 1 {
            return Err(anyhow!(
                "apply_chain_update: record {record_id} not found (rows_affected={})",
                res.rows_affected()
            ));
        }
        Ok(())
    }

    async fn insert_deal(&self, record: &DealRecord) -> Result<()> {
        let deal_id = record.deal_id.map(deal_id_to_db).transpose()?;
        sqlx::query(
            r#"
            insert into deals (
              id, reporter_is_v1, instance_id, reporter_ip, created_at,
              client, provider, label, piece_cid, piece_size,
              state, deal_id, start_epoch, end_epoch, sector_start_epoch,
              duration, verified, price
            ) values (
              $1, $2, $3, $4, $5,
              $6, $7, $8, $9, $10,
              $11, $12, $13, $14, $15,
              $16, $17, $18
            )
            "#,
        )
        .bind(record.id)
        .bind(record.reporter.protocol.is_v1())
        .bind(&record.reporter.instance_id)
        .bind(&record.reporter.ip)
        .bind(record.created_at)
        .bind(&record.client)
        .bind(&record.provider)
        .bind(&record.label)
        .bind(&record.piece_cid)
        .bind(record.piece_size)
        .bind(record.state.as_str())
        .bind(deal_id)
        .bind(record.start_epoch)
        .bind(record.end_epoch)
        .bind(record.sector_start_epoch)
        .bind(record.duration)
        .bind(record.verified)
        .bind(record.price)
        .execute(self.pool())
        .await
        .with_context(|| format!("insert_deal failed id={} deal_id={:?}", record.id, record.deal_id))?;

        Ok(())
    }

    async fn expire_active_deals(&self, reference_epoch: ChainEpoch) -> Result<u64> {
        let res = sqlx::query(
            r#"
            update deals
            set state = 'expired'
            where state = 'active'
              and end_epoch < $1
            "#,
        )
        .bind(reference_epoch)
        .execute(self.pool())
        .await
        .context("expire_active_deals failed")?;

        Ok(res.rows_affected())
    }

    async fn expire_stale_proposals(
        &self,
        reference_epoch: ChainEpoch,
        created_before: DateTime<Utc>,
    ) -> Result<u64> {
        let res = sqlx::query(
            r#"
            update deals
            set state = 'proposal_expired'
            where state in ('proposed', 'published')
              and (start_epoch < $1 or created_at < $2)
            "#,
        )
        .bind(reference_epoch)
        .bind(created_before)
        .execute(self.pool())
        .await
        .context("expire_stale_proposals failed")?;

        Ok(res.rows_affected())
    }
}
