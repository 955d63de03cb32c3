//! Seed track list: the hand-picked, really-playable part of the rotation.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{audio_bucket, Config};
use crate::protocol::Track;

/// The five core frequencies every station starts from.
pub fn core_frequencies() -> Vec<Track> {
    let core = |title: &str, artist: &str, genre: &str, file: &str, frequency: &str| Track {
        title: title.to_string(),
        artist: artist.to_string(),
        genre: genre.to_string(),
        url: format!("{}/{}", audio_bucket(), file),
        frequency: frequency.to_string(),
        is_agent: false,
    };

    vec![
        core("Red Giant", "Stellardrone", "SPACE", "Red%20Giant.mp3", "42.0 Hz"),
        core("MOS 6581", "Carbon Based Lifeforms", "GLITCH", "Mos%206581.mp3", "65.8 Hz"),
        core(
            "Stratosphere",
            "S1gns Of L1fe",
            "DRONE",
            "S1gns%20Of%20L1fe%20-%20Stratosphere.mp3",
            "11.1 Hz",
        ),
        core("Airglow", "Stellardrone", "AMBIENT", "Airglow.mp3", "98.4 Hz"),
        core("Flow", "Nomyn", "FLOW", "Nomyn%20-%20Flow.mp3", "33.3 Hz"),
    ]
}

// ── TOML loader ───────────────────────────────────────────────────────────────

/// Matches the `[[track]]` table.  Kept apart from `Track` so the file schema
/// can omit fields the wire type requires.
#[derive(Debug, serde::Deserialize)]
struct TomlTrackFile {
    #[serde(default)]
    track: Vec<TomlTrack>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlTrack {
    title: String,
    url: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    frequency: String,
}

pub fn parse_tracks_from_toml_str(content: &str) -> anyhow::Result<Vec<Track>> {
    let file: TomlTrackFile = toml::from_str(content)?;
    let tracks = file
        .track
        .into_iter()
        .map(|t| Track {
            title: t.title,
            artist: t.artist,
            genre: t.genre,
            url: t.url,
            frequency: t.frequency,
            is_agent: false,
        })
        .collect();
    Ok(tracks)
}

pub fn load_tracks_from_toml(path: &Path) -> anyhow::Result<Vec<Track>> {
    let content = std::fs::read_to_string(path)?;
    parse_tracks_from_toml_str(&content)
}

/// Resolve the seed list: configured TOML, then `tracks.toml` in the working
/// directory, then the built-in core frequencies.  Never returns an empty list.
pub fn load_seed_tracks(config: &Config) -> Vec<Track> {
    let candidates = [
        config.tracks.tracks_toml.clone(),
        PathBuf::from("tracks.toml"),
    ];

    for path in candidates.iter().filter(|p| p.exists()) {
        match load_tracks_from_toml(path) {
            Ok(tracks) if !tracks.is_empty() => {
                info!("Loaded {} seed tracks from {}", tracks.len(), path.display());
                return tracks;
            }
            Ok(_) => warn!("{} has no [[track]] entries, skipping", path.display()),
            Err(e) => warn!("Failed to parse {}: {}", path.display(), e),
        }
    }

    info!("Using built-in core frequencies as seed tracks");
    core_frequencies()
}
