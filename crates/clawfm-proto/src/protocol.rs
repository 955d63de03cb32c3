use serde::{Deserialize, Serialize};

/// Intents forwarded from a presentation layer into the station core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    PlayPause,
    SkipNext,
    ToggleMute,
    SubmitMessage { text: String },
    /// Re-run the catalog fetch and replace the playlist wholesale.
    Reload,
}

/// One playable entry of the rotation.  Immutable once placed in a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub url: String,
    /// Display label, e.g. "42.0 Hz" for core tracks or "AI-NET" for agent tracks.
    pub frequency: String,
    #[serde(default)]
    pub is_agent: bool,
}

/// Who/what produced a log line.  Drives colouring in presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    System,
    Agent,
    Tool,
    Success,
    User,
}

impl LogKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Agent => "AGENT",
            Self::Tool => "TOOL",
            Self::Success => "SUCCESS",
            Self::User => "USER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub author: String,
    pub kind: LogKind,
    pub content: String,
    pub timestamp: String,
}

/// Progression of one simulated tool-call sequence.
///
/// Ordering is the progression order: a sequence only ever moves forward,
/// one variant at a time, and restarts from `Searching` on the next track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowStage {
    #[default]
    Idle,
    Searching,
    Injecting,
    Resolving,
    Executing,
    Playing,
}

impl WorkflowStage {
    /// The stage a due timer moves to, or `None` from terminal/idle stages.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle | Self::Playing => None,
            Self::Searching => Some(Self::Injecting),
            Self::Injecting => Some(Self::Resolving),
            Self::Resolving => Some(Self::Executing),
            Self::Executing => Some(Self::Playing),
        }
    }
}

/// Workflow fields a presentation layer needs to render the tool-call panel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowView {
    pub stage: WorkflowStage,
    pub generation: u64,
    pub catalog_id: Option<u64>,
    pub library_id: Option<String>,
    pub compiled_command: Option<String>,
    /// Human-readable line describing what the current stage is doing.
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Always within `0.0..=100.0`.
    pub progress_percent: f64,
    pub current_time: String,
    pub duration: String,
    pub muted: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            progress_percent: 0.0,
            current_time: "00:00".to_string(),
            duration: "00:00".to_string(),
            muted: false,
        }
    }
}

/// Full read-only view of the station.  `rev` increases on every publish so
/// clients can detect missed updates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationSnapshot {
    #[serde(default)]
    pub rev: u64,
    /// True until the first catalog fetch has settled.
    pub loading: bool,
    pub playlist: Vec<Track>,
    pub current_index: usize,
    pub current_track: Option<Track>,
    pub playback: PlaybackState,
    pub workflow: WorkflowView,
    pub log_len: usize,
}
