use anyhow::{anyhow, Context, Result};
use smx_schemas::{ClientMapping, NewClientMapping, VerifiedClient};
use sqlx::Row;
use uuid::Uuid;

use crate::{ClientMappingStore, PgStore, UpsertOutcome, VerifiedClientStore};

fn mapping_from_row(row: &sqlx::postgres::PgRow) -> Result<ClientMapping> {
    Ok(ClientMapping {
        id: row.try_get("id")?,
        actor_id: row.try_get("actor_id")?,
        account_key: row.try_get("account_key")?,
    })
}

#[async_trait::async_trait]
impl ClientMappingStore for PgStore {
    async fn load_client_mappings(&self) -> Result<Vec<ClientMapping>> {
        let rows = sqlx::query("select id, actor_id, account_key from clients")
            .fetch_all(self.pool())
            .await
            .context("load_client_mappings failed")?;
        rows.iter().map(mapping_from_row).collect()
    }

    async fn insert_client_mapping(&self, mapping: &NewClientMapping) -> Result<ClientMapping> {
        let inserted = sqlx::query(
            r#"
            insert into clients (id, actor_id, account_key)
            values ($1, $2, $3)
            on conflict do nothing
            returning id, actor_id, account_key
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&mapping.actor_id)
        .bind(&mapping.account_key)
        .fetch_optional(self.pool())
        .await
        .context("insert_client_mapping failed")?;

        if let Some(row) = inserted {
            return mapping_from_row(&row);
        }

        // Lost to an existing row on one of the unique columns.
        let existing = sqlx::query(
            r#"
            select id, actor_id, account_key
            from clients
            where actor_id = $1 or account_key = $2
            order by created_at asc
            limit 1
            "#,
        )
        .bind(&mapping.actor_id)
        .bind(&mapping.account_key)
        .fetch_optional(self.pool())
        .await
        .context("insert_client_mapping conflict lookup failed")?;

        match existing {
            Some(row) => {
                let stored = mapping_from_row(&row)?;
                if stored.actor_id != mapping.actor_id || stored.account_key != mapping.account_key
                {
                    tracing::warn!(
                        stored_actor_id = %stored.actor_id,
                        stored_account_key = %stored.account_key,
                        actor_id = %mapping.actor_id,
                        account_key = %mapping.account_key,
                        "client mapping conflicts with stored pair; keeping stored"
                    );
                }
                Ok(stored)
            }
            None => Err(anyhow!(
                "insert_client_mapping: conflict but no row for actor_id={} account_key={}",
                mapping.actor_id,
                mapping.account_key
            )),
        }
    }
}

#[async_trait::async_trait]
impl VerifiedClientStore for PgStore {
    async fn upsert_verified_client(&self, client: &VerifiedClient) -> Result<UpsertOutcome> {
        let (inserted,): (bool,) = sqlx::query_as::<_, (bool,)>(
            r#"
            insert into verified_clients (
              id, address_id, address, name, org_name, region, website, industry, updated_at
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, now()
            )
            on conflict (id) do update set
              address_id = excluded.address_id,
              address    = excluded.address,
              name       = excluded.name,
              org_name   = excluded.org_name,
              region     = excluded.region,
              website    = excluded.website,
              industry   = excluded.industry,
              updated_at = now()
            returning (xmax = 0) as inserted
            "#,
        )
        .bind(client.id)
        .bind(&client.address_id)
        .bind(&client.address)
        .bind(&client.name)
        .bind(&client.org_name)
        .bind(&client.region)
        .bind(&client.website)
        .bind(&client.industry)
        .fetch_one(self.pool())
        .await
        .with_context(|| format!("upsert_verified_client failed id={}", client.id))?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }
}
