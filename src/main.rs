mod broadcaster;
mod catalog;
mod client_api;
mod config;
mod discovery;
mod error;
mod events;
mod import;
mod monitor;
mod protocol;
mod selection;
mod server;
mod state;
mod stats;
mod tierlist;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    broadcaster::{spawn_dispatcher, Broadcaster},
    catalog::Catalog,
    config::CompanionConfig,
    events::UiEvent,
    monitor::{run_monitor, MonitorContext},
    server::AppState,
    state::CompanionState,
    stats::StatsClient,
};

#[derive(Debug, Parser)]
#[command(name = "gtools", about = "Champion select build companion", version)]
struct Cli {
    /// Verbose logging; the UI is expected to run from its own dev server.
    #[arg(long)]
    debug: bool,

    /// Config file to use instead of the one in the OS config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address for the UI server, overriding `ui_bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let (config, config_path) = CompanionConfig::load_or_create(cli.config.as_deref())?;
    info!(path = %config_path.display(), "loaded config");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .context("failed building http client")?;
    let catalog = Arc::new(
        Catalog::load(&http, &config.cdragon_base)
            .await
            .context("failed loading static catalogs")?,
    );
    let stats = Arc::new(StatsClient::new(http, config.stats_endpoint.clone()));

    let state = Arc::new(CompanionState::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let (events_tx, events_rx) = crossbeam_channel::unbounded::<UiEvent>();
    spawn_dispatcher(events_rx, Arc::clone(&broadcaster))
        .context("failed spawning ui dispatcher")?;

    tokio::spawn(run_monitor(MonitorContext {
        config: config.clone(),
        state: Arc::clone(&state),
        catalog: Arc::clone(&catalog),
        stats: stats.clone(),
        events: events_tx,
    }));

    let bind = cli.bind.unwrap_or_else(|| config.ui_bind.clone());
    server::serve(
        AppState {
            config: Arc::new(config),
            state,
            broadcaster,
            catalog,
            stats,
        },
        &bind,
        cli.debug,
    )
    .await
}
