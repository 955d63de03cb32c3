use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub tracks: TracksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which playback primitive drives the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    #[default]
    Mpv,
    /// Simulated clock, no sound.  Useful without an mpv install.
    Silent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub backend: AudioBackend,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Duration reported by the silent backend for every track.
    #[serde(default = "default_silent_track_secs")]
    pub silent_track_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Endpoint listing agent-made songs.  Empty disables the fetch.
    #[serde(default = "default_songs_url")]
    pub songs_url: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Pacing of the simulated tool-call sequence, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_search_delay_ms")]
    pub search_delay_ms: u64,
    #[serde(default = "default_inject_delay_ms")]
    pub inject_delay_ms: u64,
    #[serde(default = "default_resolve_delay_ms")]
    pub resolve_delay_ms: u64,
    #[serde(default = "default_execute_delay_ms")]
    pub execute_delay_ms: u64,
    /// Fixed RNG seed.  When unset the engine seeds from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracksConfig {
    /// Local TOML file with `[[track]]` seed entries.
    #[serde(default = "default_tracks_toml")]
    pub tracks_toml: PathBuf,
    /// Playable stand-ins for agent tracks, which carry no audio of their own.
    #[serde(default = "default_fallback_pool")]
    pub fallback_pool: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: AudioBackend::default(),
            volume: default_volume(),
            silent_track_secs: default_silent_track_secs(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            songs_url: default_songs_url(),
            fetch_limit: default_fetch_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: default_search_delay_ms(),
            inject_delay_ms: default_inject_delay_ms(),
            resolve_delay_ms: default_resolve_delay_ms(),
            execute_delay_ms: default_execute_delay_ms(),
            seed: None,
        }
    }
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            tracks_toml: default_tracks_toml(),
            fallback_pool: default_fallback_pool(),
        }
    }
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8989
}

fn default_volume() -> f32 {
    0.5
}

fn default_silent_track_secs() -> f64 {
    240.0
}

fn default_songs_url() -> String {
    "http://127.0.0.1:3000/api/v1/songs".to_string()
}

fn default_fetch_limit() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_search_delay_ms() -> u64 {
    1000
}

fn default_inject_delay_ms() -> u64 {
    1200
}

fn default_resolve_delay_ms() -> u64 {
    1500
}

fn default_execute_delay_ms() -> u64 {
    1500
}

fn default_tracks_toml() -> PathBuf {
    platform::config_dir().join("tracks.toml")
}

const AUDIO_BUCKET: &str = "https://tpujbxodmfynjmatiooq.supabase.co/storage/v1/object/public/audio";

fn default_fallback_pool() -> Vec<String> {
    vec![
        format!("{AUDIO_BUCKET}/Airglow.mp3"),
        format!("{AUDIO_BUCKET}/Chillout%20Sappheiros%20-%20Embrace.mp3"),
    ]
}

/// Base URL of the public bucket the built-in seed tracks stream from.
pub fn audio_bucket() -> &'static str {
    AUDIO_BUCKET
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
