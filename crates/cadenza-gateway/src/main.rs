use std::net::SocketAddr;
use std::sync::Arc;

use cadenza_core::CadenzaConfig;
use cadenza_player::{M3uPlaylistBuilder, PlayerSession, VlcLauncher};
use cadenza_scheduler::{ScheduleReconciler, SchedulerRuntime, TriggerTable};
use cadenza_store::ScheduleStore;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

mod app;
mod http;
mod outlet;
mod playback;

/// Weekly media playback scheduler driving an external player.
#[derive(Parser, Debug)]
#[command(name = "cadenza", version, about)]
struct Cli {
    /// Config file (defaults to $CADENZA_CONFIG, then ~/.cadenza/cadenza.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadenza=info,cadenza_gateway=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = CadenzaConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CadenzaConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let store = ScheduleStore::new(db)?;

    let player = Arc::new(PlayerSession::new(
        config.player.clone(),
        Box::new(VlcLauncher::from_config(&config.player)),
    ));
    if config.player.launch_on_boot {
        let state = player.start(None).await;
        info!(?state, "player launched on boot");
    }

    // Whole persisted set goes in before the runtime fires anything.
    let table = Arc::new(TriggerTable::new());
    let reconciler = ScheduleReconciler::new(Arc::clone(&table));
    let report = reconciler.reconcile_all(&store.records()?);
    for rejected in &report.rejected {
        warn!(
            record_id = %rejected.record_id,
            code = rejected.code,
            reason = %rejected.reason,
            "schedule record has no triggers"
        );
    }

    ensure_dir(&config.media.playlist_dir);
    let playlists = Arc::new(M3uPlaylistBuilder::from_config(&config.media));
    let orchestrator = Arc::new(playback::PlaybackOrchestrator::new(
        Arc::clone(&player),
        playlists,
    ));
    let runtime = SchedulerRuntime::new(Arc::clone(&table), orchestrator, config.scheduler.clone());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = tokio::spawn(runtime.run(shutdown_rx));

    let outlets = Arc::new(outlet::HttpOutlets::new(config.outlets.clone())?);
    let addr: SocketAddr = format!("{}:{}", config.http.bind, config.http.port).parse()?;
    let state = Arc::new(app::AppState::new(
        config,
        store,
        reconciler,
        Arc::clone(&player),
        outlets,
    ));
    let router = app::build_router(state);

    info!("Cadenza listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Ordered shutdown: no new fires, drain callbacks, then release the player.
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        error!("scheduler runtime task failed: {e}");
    }
    player.close().await;
    info!("Cadenza stopped");

    served?;
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
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
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        ensure_dir(&parent.to_string_lossy());
    }
}

fn ensure_dir(path: &str) {
    if let Err(e) = std::fs::create_dir_all(path) {
        warn!(path, error = %e, "could not create directory");
    }
}
