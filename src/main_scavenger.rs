//! DNS Scavenger Entry Point
//!
//! Runs the record scavenging sweep over every configured zone, either once
//! or on a timer until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! # Sweep on the configured interval
//! dns-scavenger --config /etc/dns-aging.toml
//!
//! # One sweep, reports as JSON lines
//! dns-scavenger --config aging.yaml --once --json
//!
//! # Throwaway in-memory store (for testing)
//! dns-scavenger --in-memory --once
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dns_aging::dns::{
    AgingConfig, AgingEngine, AgingInstant, MemoryNodeStore, NodeStore, SqliteNodeStore,
    SweepReport,
};

/// DNS record scavenger
#[derive(Parser, Debug)]
#[command(name = "dns-scavenger")]
#[command(author = "AEGIS Team")]
#[command(version = "0.1.0")]
#[command(about = "DNS record aging and scavenging sweep", long_about = None)]
struct Args {
    /// Path to configuration file (TOML, or YAML by .yaml/.yml extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides storage.db_path)
    #[arg(long)]
    db_path: Option<String>,

    /// Use a throwaway in-memory store
    #[arg(long)]
    in_memory: bool,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Seconds between sweeps (overrides sweep.interval_secs)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Print each sweep report as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting DNS scavenger v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AgingConfig::default(),
    };
    let config = apply_overrides(config, &args)?;

    let store: Arc<dyn NodeStore> = if args.in_memory {
        info!("Storage: in-memory");
        Arc::new(MemoryNodeStore::new())
    } else {
        info!("Storage: {}", config.storage.db_path);
        Arc::new(SqliteNodeStore::new(&config.storage.db_path)?)
    };

    let engine = AgingEngine::new(store, &config)?;

    if engine.zones().is_empty() {
        warn!("No zones configured; sweeps will have nothing to do");
    }
    for zone in engine.zones() {
        let serial = engine.restore_zone_serial(&zone).await?;
        let aging = engine.zone_config(&zone)?;
        info!(
            "Zone {}: aging {}, no-refresh {}h, refresh {}h, serial {}",
            zone,
            if aging.enabled { "on" } else { "off" },
            aging.no_refresh_hours,
            aging.refresh_hours,
            serial
        );
    }
    info!("Tombstone lifetime: {}h", engine.tombstone_lifetime_hours());

    if args.once {
        sweep(&engine, args.json).await?;
        return Ok(());
    }

    if !config.sweep.enabled {
        info!("Periodic sweep disabled; use --once for a single pass");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sweep.interval_secs));
    info!("Sweeping every {}s", config.sweep.interval_secs);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // One failed pass must not stop the timer
                if let Err(e) = sweep(&engine, args.json).await {
                    error!("Sweep failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Overlay command line arguments on the file configuration and validate it
fn apply_overrides(mut config: AgingConfig, args: &Args) -> anyhow::Result<AgingConfig> {
    if let Some(db_path) = &args.db_path {
        config.storage.db_path = db_path.clone();
    }
    if let Some(interval) = args.interval_secs {
        config.sweep.interval_secs = interval;
    }
    // A single pass runs no timer
    if args.once {
        config.sweep.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> anyhow::Result<AgingConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => AgingConfig::from_yaml(&content)?,
        _ => AgingConfig::from_toml(&content)?,
    };
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

async fn sweep(engine: &AgingEngine, json: bool) -> anyhow::Result<Vec<SweepReport>> {
    let reports = engine.run_sweep_all(AgingInstant::now()).await?;
    if json {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
    }
    Ok(reports)
}
