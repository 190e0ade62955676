//! `smx reconcile`: wire the Postgres store, identity lookup, snapshot
//! source and datacap feed into one run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use smx_chain::{DatacapFeed, FileSnapshotSource, HttpSnapshotSource, SnapshotSource};
use smx_config::{ConfigMode, UnusedKeyPolicy};
use smx_reconcile::RunClock;
use smx_runtime::{run_reconciliation, ClientSyncDeps, IdentityResolver, RunDeps, RunOptions};

use super::{connect_store, load_config, lotus_client};

pub async fn reconcile(
    config_paths: Vec<String>,
    snapshot_file: Option<String>,
    skip_client_sync: bool,
    strict_config: bool,
) -> Result<()> {
    let policy = if strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let cfg = load_config(&config_paths, ConfigMode::Reconcile, policy)?;
    let s = &cfg.settings;

    let store = connect_store().await?;
    let lookup = Arc::new(lotus_client(&cfg)?);
    let resolver = Arc::new(IdentityResolver::load(lookup, store.clone()).await?);

    let snapshot: Arc<dyn SnapshotSource> = match snapshot_file {
        Some(path) => {
            let zstd = s.snapshot.compression.is_zstd_for(&path);
            Arc::new(FileSnapshotSource::new(path, zstd, s.snapshot.channel_capacity))
        }
        None => {
            let zstd = s.snapshot.compression.is_zstd_for(&s.snapshot.url);
            Arc::new(HttpSnapshotSource::new(
                s.snapshot.url.clone(),
                zstd,
                s.snapshot.channel_capacity,
            ))
        }
    };

    let client_sync = if s.datacap.sync_before_reconcile && !skip_client_sync {
        let feed = DatacapFeed::new(
            s.datacap.url.clone(),
            Duration::from_secs(s.datacap.timeout_secs),
        )?;
        Some(ClientSyncDeps {
            feed: Arc::new(feed),
            store: store.clone(),
        })
    } else {
        None
    };

    let deps = RunDeps {
        deals: store,
        resolver,
        snapshot,
        client_sync,
    };
    let reference_lag = chrono::Duration::try_hours(s.reconcile.reference_lag_hours)
        .context("reconcile.reference_lag_hours out of range")?;
    let proposal_max_age = chrono::Duration::try_days(s.reconcile.proposal_max_age_days)
        .context("reconcile.proposal_max_age_days out of range")?;
    let opts = RunOptions {
        clock: RunClock::new(Utc::now(), reference_lag),
        proposal_max_age,
    };

    let report = run_reconciliation(&deps, &opts).await?;

    println!("config_hash={}", cfg.loaded.config_hash);
    for line in report.to_lines() {
        println!("{line}");
    }
    Ok(())
}
