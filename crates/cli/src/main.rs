use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xseedr_core::{
    load_config, validate_config, ClientBackend, Engine, HttpIndexClient, HttpTrackerProvider,
    IndexClient, MirrorStore, QBittorrentClient, SqliteMirror, TorrentClient, TrackerProvider,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("XSEEDR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("xseedr.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    // Credential check happens here, before any client is contacted.
    let index: Arc<dyn IndexClient> =
        Arc::new(HttpIndexClient::new(&config.index).context("Failed to create index client")?);

    let mirror: Arc<dyn MirrorStore> = Arc::new(
        SqliteMirror::new(&config.database.path).context("Failed to open mirror database")?,
    );

    // Positional args select a subset of configured clients;
    // with no args every enabled client runs.
    let selected: Vec<String> = std::env::args().skip(1).collect();

    let mut clients: Vec<Arc<dyn TorrentClient>> = Vec::new();
    for client_config in config.clients.iter().filter(|c| !c.disabled) {
        if !selected.is_empty() && !selected.contains(&client_config.name) {
            continue;
        }
        let client: Arc<dyn TorrentClient> = match client_config.backend {
            ClientBackend::Qbittorrent => Arc::new(
                QBittorrentClient::new(client_config.clone())
                    .with_context(|| format!("Failed to create client {}", client_config.name))?,
            ),
        };
        clients.push(client);
    }
    if clients.is_empty() {
        bail!("no enabled clients selected");
    }

    let trackers: Arc<dyn TrackerProvider> =
        Arc::new(HttpTrackerProvider::new(&config.trackers));

    let engine = Engine::new(config, clients, trackers, index, mirror);
    let report = engine.run().await.context("Cross-seed run failed")?;

    println!(
        "Done cross-seeding {} clients. Targets / Matches / Added: {} / {} / {}{}",
        report.clients_processed,
        report.counters.targets_touched,
        report.counters.injection_attempts,
        report.counters.injection_successes,
        if report.halted_by_budget {
            " (stopped at injection budget)"
        } else {
            ""
        },
    );

    Ok(())
}
