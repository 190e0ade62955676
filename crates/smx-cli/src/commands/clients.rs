//! `smx clients sync` and `smx resolve`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use smx_chain::DatacapFeed;
use smx_config::{ConfigMode, UnusedKeyPolicy};
use smx_runtime::{sync_verified_clients, IdentityResolver, ResolveError};

use super::{connect_store, load_config, lotus_client};

pub async fn clients_sync(config_paths: Vec<String>) -> Result<()> {
    let cfg = load_config(&config_paths, ConfigMode::ClientSync, UnusedKeyPolicy::Warn)?;
    let store = connect_store().await?;
    let feed = DatacapFeed::new(
        cfg.settings.datacap.url.clone(),
        Duration::from_secs(cfg.settings.datacap.timeout_secs),
    )?;

    let counts = sync_verified_clients(&feed, store.as_ref()).await?;
    println!("clients_fetched={}", counts.fetched);
    println!("clients_inserted={}", counts.inserted);
    println!("clients_updated={}", counts.updated);
    Ok(())
}

pub async fn resolve(config_paths: Vec<String>, id: String) -> Result<()> {
    let cfg = load_config(&config_paths, ConfigMode::Resolve, UnusedKeyPolicy::Warn)?;
    let store = connect_store().await?;
    let lookup = Arc::new(lotus_client(&cfg)?);
    let resolver = IdentityResolver::load(lookup, store).await?;

    match resolver.resolve(&id).await {
        Ok(m) => {
            println!("resolved=true");
            println!("actor_id={}", m.actor_id);
            println!("account_key={}", m.account_key);
        }
        Err(ResolveError::NotFound(_)) => {
            println!("resolved=false id={id}");
        }
        Err(ResolveError::Fatal(e)) => return Err(e),
    }
    Ok(())
}
