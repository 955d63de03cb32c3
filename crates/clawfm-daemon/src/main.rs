mod catalog;
mod http;
mod mpv;
mod silent;

use clawfm_engine::catalog::TrackSource;
use clawfm_engine::output::{AudioEvent, AudioOutput};
use clawfm_engine::playlist::PlaylistComposer;
use clawfm_engine::{Engine, EngineSettings, StationCore, StationHandle, StationUpdate};
use clawfm_proto::config::{AudioBackend, Config};
use clawfm_proto::platform;
use clawfm_proto::protocol::LogEntry;
use clawfm_proto::tracks::load_seed_tracks;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::catalog::HttpCatalog;
use crate::mpv::MpvOutput;
use crate::silent::SilentOutput;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("clawfm.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "info,clawfm_engine=debug,clawfm_daemon=debug,hyper=warn,reqwest=warn".to_string()
    });
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("clawfm log: {}", log_path.display());
    info!("clawfm starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Config load failed, using defaults: {}", e);
            Config::default()
        }
    };

    // ── Build engine ─────────────────────────────────────────────────────────
    let composer = PlaylistComposer::new(
        load_seed_tracks(&config),
        config.tracks.fallback_pool.clone(),
        config.catalog.fetch_limit,
    )?;
    let engine = Engine::new(composer, EngineSettings::from_config(&config));
    let catalog = HttpCatalog::new(&config.catalog)?;

    // ── Pick the playback primitive ──────────────────────────────────────────
    let (audio_tx, audio_rx) = mpsc::channel::<AudioEvent>(256);
    match config.audio.backend {
        AudioBackend::Mpv => {
            info!("Audio backend: mpv");
            let output = MpvOutput::new(config.audio.volume, audio_tx);
            run_station(&config, engine, output, catalog, audio_rx).await
        }
        AudioBackend::Silent => {
            info!("Audio backend: silent ({}s tracks)", config.audio.silent_track_secs);
            let output = SilentOutput::new(config.audio.silent_track_secs, audio_tx);
            run_station(&config, engine, output, catalog, audio_rx).await
        }
    }
}

async fn run_station<O: AudioOutput, S: TrackSource>(
    config: &Config,
    engine: Engine,
    output: O,
    source: S,
    audio_rx: mpsc::Receiver<AudioEvent>,
) -> anyhow::Result<()> {
    let (core, station) = StationCore::new(engine, output, source, audio_rx);
    spawn_transcript(&station).await;

    if config.http.enabled {
        http::start_server(config.http.bind_address.clone(), config.http.port, station.clone());
    }

    // ── Spawn StationCore event loop ─────────────────────────────────────────
    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run().await {
            error!("StationCore exited with error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    station.shutdown().await;
    core_task.await?;
    Ok(())
}

/// Echo the station transcript to stdout as it grows.
async fn spawn_transcript(station: &StationHandle) {
    // subscribe before reading the backlog so nothing falls in between
    let mut updates = station.subscribe();
    for entry in station.logs_since(0).await {
        print_entry(&entry);
    }
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(StationUpdate::LogAppended(entry)) => print_entry(&entry),
                Ok(StationUpdate::StateUpdated(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("transcript: skipped {} updates", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn print_entry(entry: &LogEntry) {
    println!(
        "[{}] {:<14} {:<7} {}",
        entry.timestamp,
        entry.author,
        entry.kind.label(),
        entry.content
    );
}
