//! Application bootstrap wiring.
//!
//! # Design
//! - Dependencies are built in one place from the configuration document and
//!   the environment; the reconciliation loop itself stays a plain interval
//!   around [`strand_runner::TorrentRunner::tick`].
//! - The driver serializes ticks by construction: one loop, one runner, and
//!   `MissedTickBehavior::Delay` so a slow tick pushes the next one out
//!   instead of stacking invocations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use strand_config::ConfigHandle;
use strand_core::{
    BulkStatusClient, DownloadClientKind, DownloadStore, ProgressReporter, TorrentGateway,
    WorkerFactory,
};
use strand_data::PgStore;
use strand_debrid::{AddTorrentRequest, DebridTorrentGateway, RealDebridClient};
use strand_events::EventBus;
use strand_runner::{ActiveRegistry, TorrentRunner};
use strand_telemetry::LoggingConfig;
use strand_workers::{Aria2Client, StrandWorkerFactory};
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::error::{AppError, AppResult};
use crate::reporter::EventProgressReporter;

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, database, or client construction
/// fails; the running reconciliation loop itself never errors out.
pub async fn run_app() -> AppResult<()> {
    let cli = Cli::parse();
    let config = strand_config::load_from_path(&cli.config).await?;

    strand_telemetry::init_logging(&LoggingConfig {
        filter: config.telemetry.log_filter.clone(),
        json: config.telemetry.json_logs,
    })?;
    info!(config = %cli.config.display(), "strand starting");

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| AppError::MissingEnv { name: "DATABASE_URL" })?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    let store = PgStore::new(pool).await?;

    let events = EventBus::new();
    let handle = ConfigHandle::new(config.clone());
    let client = RealDebridClient::new(
        &config.provider.api_url,
        &config.provider.api_key,
        Duration::from_secs(config.provider.timeout_secs),
    )?;
    let gateway = Arc::new(DebridTorrentGateway::new(
        client,
        store.clone(),
        events.clone(),
        handle.clone(),
    ));

    if let Some(Command::Add { magnet, category }) = cli.command {
        let torrent_id = gateway
            .add_magnet(AddTorrentRequest {
                magnet,
                category,
                finished_action: strand_core::FinishedAction::default(),
                host_download_action: strand_core::HostDownloadAction::default(),
                lifetime: 0,
                delete_on_error: 0,
                torrent_retry_attempts: config.general.torrent_retry_attempts,
                download_retry_attempts: config.general.download_retry_attempts,
            })
            .await?;
        println!("{torrent_id}");
        return Ok(());
    }

    let aria2 = build_aria2_client(&config)?;
    let factory = Arc::new(StrandWorkerFactory::new(
        config.download_client.kind,
        aria2.clone(),
        config.download_client.mount_path.clone().map(PathBuf::from),
    )?);
    let bulk = aria2.map(|client| Arc::new(client) as Arc<dyn BulkStatusClient>);
    let reporter = Arc::new(EventProgressReporter::new(
        Arc::clone(&gateway) as Arc<dyn TorrentGateway>,
        events.clone(),
    ));
    let registry = Arc::new(ActiveRegistry::new());

    let runner = TorrentRunner::new(
        gateway as Arc<dyn TorrentGateway>,
        Arc::new(store) as Arc<dyn DownloadStore>,
        factory as Arc<dyn WorkerFactory>,
        bulk,
        reporter as Arc<dyn ProgressReporter>,
        handle,
        registry,
    );
    runner.initialize().await?;

    let interval = Duration::from_secs(config.general.tick_interval_secs);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = config.general.tick_interval_secs, "reconciliation loop running");

    loop {
        tokio::select! {
            _ = ticker.tick() => runner.tick().await,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }
    Ok(())
}

fn build_aria2_client(config: &strand_config::AppConfig) -> AppResult<Option<Aria2Client>> {
    if config.download_client.kind != DownloadClientKind::Aria2c {
        return Ok(None);
    }
    let Some(endpoint) = config.download_client.aria2c_url.clone() else {
        return Ok(None);
    };
    let client = Aria2Client::new(
        endpoint,
        config.download_client.aria2c_secret.clone(),
        Duration::from_secs(config.provider.timeout_secs),
    )?;
    Ok(Some(client))
}
