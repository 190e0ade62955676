use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "smx")]
#[command(about = "Storage market deal reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Reconcile tracked deals against the current market snapshot
    Reconcile {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Read the snapshot from a local file instead of snapshot.url
        #[arg(long = "snapshot-file")]
        snapshot_file: Option<String>,

        /// Skip the verified-clients sync regardless of config
        #[arg(long = "skip-client-sync", default_value_t = false)]
        skip_client_sync: bool,

        /// Fail instead of warn when the config has keys this command does not read
        #[arg(long = "strict-config", default_value_t = false)]
        strict_config: bool,
    },

    /// Verified-clients commands
    Clients {
        #[command(subcommand)]
        cmd: ClientsCmd,
    },

    /// Resolve a client identity (actor id or account key) to its mapping
    Resolve {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// `f0...` actor id or account key
        id: String,
    },

    /// Convert between wall-clock time and chain epochs
    Epoch {
        /// RFC3339 timestamp (default: now)
        #[arg(long, conflicts_with = "from")]
        at: Option<String>,

        /// Epoch to convert to a timestamp
        #[arg(long, allow_hyphen_values = true)]
        from: Option<i64>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ClientsCmd {
    /// Fetch the verified-clients feed and upsert every entry
    Sync {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience; missing file is fine.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = smx_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = smx_db::status(&pool).await?;
                    println!("db_ok={} has_deals_table={}", s.ok, s.has_deals_table);
                }
                DbCmd::Migrate => {
                    smx_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = smx_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Reconcile {
            config_paths,
            snapshot_file,
            skip_client_sync,
            strict_config,
        } => {
            commands::reconcile::reconcile(
                config_paths,
                snapshot_file,
                skip_client_sync,
                strict_config,
            )
            .await?;
        }

        Commands::Clients { cmd } => match cmd {
            ClientsCmd::Sync { config_paths } => {
                commands::clients::clients_sync(config_paths).await?;
            }
        },

        Commands::Resolve { config_paths, id } => {
            commands::clients::resolve(config_paths, id).await?;
        }

        Commands::Epoch { at, from } => {
            commands::epoch(at.as_deref(), from)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
