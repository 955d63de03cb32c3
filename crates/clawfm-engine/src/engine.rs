//! Engine state and the reducer that drives it.
//!
//! `Engine::handle` is the only way state changes.  It never blocks and never
//! fails; anything that has to happen outside the engine (timers, audio,
//! network) is returned as an [`Effect`] for the driver to carry out.

use std::time::Duration;

use clawfm_proto::config::Config;
use clawfm_proto::protocol::{Command, LogKind, StationSnapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::catalog::AgentSong;
use crate::error::CatalogError;
use crate::log::{Clock, LogDraft, LogStream, SystemClock, AUTHOR_ADMIN, AUTHOR_TOOL, AUTHOR_USER};
use crate::output::AudioEvent;
use crate::playback::{PlaybackCommand, PlaybackController};
use crate::playlist::{Playlist, PlaylistComposer};
use crate::scheduler::TrackScheduler;
use crate::workflow::{StageStep, WorkflowMachine, WorkflowTiming};

// ── Events and effects ───────────────────────────────────────────────────────

/// Every input the engine reacts to.
#[derive(Debug)]
pub enum Event {
    /// The catalog lookup settled, one way or the other.
    CatalogFetched(Result<Vec<AgentSong>, CatalogError>),
    /// A workflow stage timer fired.
    StageDue { generation: u64 },
    Audio(AudioEvent),
    /// The primitive answered a `PlaybackCommand::Play`.
    PlayOutcome {
        load_id: u64,
        result: Result<(), String>,
    },
    Command(Command),
    Shutdown,
}

/// Work the driver performs on the engine's behalf, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Playback(PlaybackCommand),
    /// Post `StageDue { generation }` after `delay`, replacing any pending timer.
    Schedule { generation: u64, delay: Duration },
    FetchCatalog { limit: usize },
}

// ── Settings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub timing: WorkflowTiming,
    /// Seed for every random choice.  `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timing: WorkflowTiming::from_config(&config.workflow),
            seed: config.workflow.seed,
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct Engine {
    composer: PlaylistComposer,
    playlist: Playlist,
    scheduler: TrackScheduler,
    playback: PlaybackController,
    workflow: WorkflowMachine,
    log: LogStream,
    rng: StdRng,
    clock: Box<dyn Clock>,
    timing: WorkflowTiming,
    /// True until the first catalog fetch settles.
    loading: bool,
    rev: u64,
}

impl Engine {
    pub fn new(composer: PlaylistComposer, settings: EngineSettings) -> Self {
        Self::with_clock(composer, settings, Box::new(SystemClock))
    }

    pub fn with_clock(
        composer: PlaylistComposer,
        settings: EngineSettings,
        clock: Box<dyn Clock>,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut engine = Self {
            playlist: composer.seed_playlist(),
            composer,
            scheduler: TrackScheduler::default(),
            playback: PlaybackController::new(),
            workflow: WorkflowMachine::new(),
            log: LogStream::new(),
            rng,
            clock,
            timing: settings.timing,
            loading: true,
            rev: 0,
        };
        engine.append(LogDraft::new(
            AUTHOR_ADMIN,
            LogKind::System,
            "Initializing Deep Sea Radio network...",
        ));
        engine.append(LogDraft::new(
            AUTHOR_ADMIN,
            LogKind::System,
            "Connecting to mcp-applemusic server instance...",
        ));
        engine.append(LogDraft::new(
            AUTHOR_TOOL,
            LogKind::Tool,
            "Apple Music MCP v0.6.0 Online. Enforcing Library-First Workflow.",
        ));
        engine
    }

    /// Effects to run once when the driver starts.
    pub fn start(&self) -> Vec<Effect> {
        vec![Effect::FetchCatalog {
            limit: self.composer.fetch_limit(),
        }]
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let effects = match event {
            Event::CatalogFetched(fetched) => self.replace_playlist(fetched),
            Event::StageDue { generation } => self.on_stage_due(generation),
            Event::Audio(audio) => self.on_audio(audio),
            Event::PlayOutcome { load_id, result } => {
                self.playback.on_play_outcome(load_id, result);
                Vec::new()
            }
            Event::Command(cmd) => self.on_command(cmd),
            Event::Shutdown => {
                self.workflow.cancel();
                self.playback
                    .pause()
                    .map(Effect::Playback)
                    .into_iter()
                    .collect()
            }
        };
        self.rev += 1;
        effects
    }

    fn on_command(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::PlayPause => {
                let next = if self.playback.is_playing() {
                    self.playback.pause()
                } else {
                    self.playback.play()
                };
                next.map(Effect::Playback).into_iter().collect()
            }
            Command::SkipNext => {
                if self.loading {
                    debug!("Engine: skip ignored while loading");
                    return Vec::new();
                }
                self.scheduler.advance(&self.playlist);
                self.select_current()
            }
            Command::ToggleMute => {
                let muted = !self.playback.muted();
                self.playback
                    .set_muted(muted)
                    .map(Effect::Playback)
                    .into_iter()
                    .collect()
            }
            Command::SubmitMessage { text } => {
                if !text.trim().is_empty() {
                    self.append(LogDraft::new(AUTHOR_USER, LogKind::User, text));
                }
                Vec::new()
            }
            Command::Reload => {
                info!("Engine: reloading playlist");
                self.start()
            }
        }
    }

    fn on_audio(&mut self, audio: AudioEvent) -> Vec<Effect> {
        match audio {
            AudioEvent::MetadataReady { load_id, duration } => self
                .playback
                .on_metadata_ready(load_id, duration, &mut self.rng)
                .map(Effect::Playback)
                .into_iter()
                .collect(),
            AudioEvent::TimeUpdate {
                load_id,
                position,
                duration,
            } => {
                self.playback.on_time_update(load_id, position, duration);
                Vec::new()
            }
            AudioEvent::Ended { load_id } => {
                if self.loading {
                    return Vec::new();
                }
                if !self.playback.is_current(load_id) {
                    debug!("Engine: ignoring end of superseded load #{}", load_id);
                    return Vec::new();
                }
                self.scheduler.advance(&self.playlist);
                self.select_current()
            }
        }
    }

    fn on_stage_due(&mut self, generation: u64) -> Vec<Effect> {
        let Some(StageStep {
            entry,
            next_delay,
            start_playback,
        }) = self.workflow.on_due(generation, &mut self.rng, &self.timing)
        else {
            return Vec::new();
        };

        self.append(entry);
        let mut effects = Vec::new();
        if let Some(delay) = next_delay {
            effects.push(Effect::Schedule { generation, delay });
        }
        if start_playback {
            effects.extend(self.playback.start().map(Effect::Playback));
        }
        effects
    }

    fn replace_playlist(&mut self, fetched: Result<Vec<AgentSong>, CatalogError>) -> Vec<Effect> {
        self.playlist = self.composer.compose(fetched, &mut self.rng);
        self.scheduler.reset();
        self.loading = false;
        self.select_current()
    }

    /// Make the track under the scheduler current.  Cancelling the old
    /// sequence and opening the new one happen inside this one call.
    fn select_current(&mut self) -> Vec<Effect> {
        let Some(track) = self.playlist.get(self.scheduler.current()).cloned() else {
            return Vec::new();
        };
        let step = self.workflow.begin(&track, &self.timing);
        let generation = self.workflow.generation();
        self.append(step.entry);

        let mut effects = vec![Effect::Playback(self.playback.load_track(&track))];
        if let Some(delay) = step.next_delay {
            effects.push(Effect::Schedule { generation, delay });
        }
        effects
    }

    fn append(&mut self, draft: LogDraft) {
        let now = self.clock.now();
        self.log.append(draft, now);
    }

    // ── Read side ────────────────────────────────────────────────────────────

    pub fn log(&self) -> &LogStream {
        &self.log
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn current_index(&self) -> usize {
        self.scheduler.current()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn snapshot(&self) -> StationSnapshot {
        let current_index = self.scheduler.current();
        StationSnapshot {
            rev: self.rev,
            loading: self.loading,
            playlist: self.playlist.tracks().to_vec(),
            current_index,
            current_track: self.playlist.get(current_index).cloned(),
            playback: self.playback.state(),
            workflow: self.workflow.view(),
            log_len: self.log.len(),
        }
    }
}
