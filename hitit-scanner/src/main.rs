//! HitIt Scanner (hitit-scanner) - Main entry point
//!
//! Wires the card repository, the Deezer client, the playback collaborators
//! and the scanner session together and serves the control API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hitit_common::events::EventBus;
use hitit_scanner::api::{self, AppContext};
use hitit_scanner::config;
use hitit_scanner::deezer::DeezerClient;
use hitit_scanner::orientation::{OrientationMonitor, SensorAxis};
use hitit_scanner::platform::{DesktopLauncher, PreviewPlayer, RemoteAccelerometer};
use hitit_scanner::playback::{DeezerMusicService, PlaybackDispatcher};
use hitit_scanner::repository::StaticCardRepository;
use hitit_scanner::scanner::{ScannerDeps, ScannerSession, SessionOptions};
use hitit_scanner::settings::{self, SettingsService, SqliteSettingsStore};

/// Command-line arguments for hitit-scanner
#[derive(Parser, Debug)]
#[command(name = "hitit-scanner")]
#[command(about = "Card scanner service for the HitIt music game")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "HITIT_PORT")]
    port: Option<u16>,

    /// Folder holding the database
    #[arg(short, long, env = "HITIT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hitit_scanner=debug,hitit_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_file = config::load(args.config.as_deref());
    let scanner_config = config_file.scanner;
    let port = args.port.unwrap_or(scanner_config.port);

    let root_folder = hitit_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "HITIT_ROOT_FOLDER",
        args.config.as_deref(),
    );

    info!("Starting HitIt Scanner on port {}", port);
    info!("Root folder: {}", root_folder.display());

    // Settings database
    let db_path = config::db_path(&root_folder);
    let db_pool = hitit_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let defaults = settings::default_settings();
    let defaults: Vec<(&str, &str)> = defaults.iter().map(|(k, v)| (*k, v.as_str())).collect();
    hitit_common::db::init_default_settings(&db_pool, &defaults)
        .await
        .context("Failed to seed default settings")?;

    let events = EventBus::default();
    let settings = Arc::new(
        SettingsService::load(
            Arc::new(SqliteSettingsStore::new(db_pool.clone())),
            scanner_config.release_preview,
            events.clone(),
        )
        .await,
    );

    // Lookups
    let repository = Arc::new(StaticCardRepository::builtin(
        scanner_config.simulated_lookup_delay(),
    ));
    let card_count = Some(repository.len());
    info!("Card table loaded: {} cards", repository.len());

    let deezer = Arc::new(
        DeezerClient::with_base_url(scanner_config.deezer_api_base.as_str())
            .context("Failed to create Deezer client")?,
    );

    // Platform collaborators
    let launcher = Arc::new(DesktopLauncher::new(&scanner_config.installed_schemes));
    let audio = Arc::new(PreviewPlayer::new().context("Failed to start audio thread")?);
    let dispatcher = Arc::new(PlaybackDispatcher::new(
        Arc::new(DeezerMusicService::new(launcher)),
        deezer.clone(),
        audio,
    ));

    let sensor = Arc::new(RemoteAccelerometer::new());
    let monitor = Arc::new(OrientationMonitor::new(
        sensor.clone(),
        SensorAxis::new(scanner_config.sensor_scale, scanner_config.sensor_polarity),
        events.clone(),
    ));

    let session = Arc::new(
        ScannerSession::new(
            ScannerDeps {
                repository,
                metadata: deezer,
                dispatcher: dispatcher.clone(),
                monitor: monitor.clone(),
            },
            settings.clone(),
            events.clone(),
            SessionOptions {
                flip_arm_delay: scanner_config.flip_arm_delay(),
            },
        )
        .await,
    );

    let ctx = AppContext {
        session: session.clone(),
        settings,
        sensor,
        monitor,
        dispatcher,
        events,
        card_count,
    };

    api::run(ctx, &scanner_config.bind_address, port, shutdown_signal())
        .await
        .context("Server error")?;

    session.shutdown().await;
    db_pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
