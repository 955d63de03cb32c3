/// StationCore — single-owner event loop around the [`Engine`].
///
/// StationCore owns the engine and the audio output exclusively.  Intents,
/// stage timers, audio observations and catalog results all arrive as
/// [`Event`]s on one mpsc channel and are applied strictly one at a time, so
/// there is never a moment where two workflow sequences can both write.
///
/// After every event the published view is refreshed and a
/// [`StationUpdate`] goes out on a broadcast channel.
use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::anyhow;
use clawfm_proto::protocol::{Command, LogEntry, StationSnapshot};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::catalog::TrackSource;
use crate::engine::{Effect, Engine, Event};
use crate::output::{AudioEvent, AudioOutput};
use crate::playback::PlaybackCommand;

const EVENT_CAPACITY: usize = 256;
const UPDATE_CAPACITY: usize = 1024;

/// Pushed to every subscriber after the core applies an event.
#[derive(Debug, Clone)]
pub enum StationUpdate {
    /// Snapshot changed; carries the new one.
    StateUpdated(StationSnapshot),
    /// One new transcript entry, in append order.
    LogAppended(LogEntry),
}

#[derive(Debug, Default)]
struct Published {
    snapshot: StationSnapshot,
    log: Vec<LogEntry>,
}

// ── StationHandle ─────────────────────────────────────────────────────────────

/// Cloneable read/intent access for presentation layers.
#[derive(Clone)]
pub struct StationHandle {
    events: mpsc::Sender<Event>,
    view: Arc<RwLock<Published>>,
    updates: broadcast::Sender<StationUpdate>,
}

impl StationHandle {
    pub async fn snapshot(&self) -> StationSnapshot {
        self.view.read().await.snapshot.clone()
    }

    /// Log entries after the first `offset`.
    pub async fn logs_since(&self, offset: usize) -> Vec<LogEntry> {
        let view = self.view.read().await;
        view.log.get(offset..).map(<[LogEntry]>::to_vec).unwrap_or_default()
    }

    pub async fn send(&self, cmd: Command) -> anyhow::Result<()> {
        self.events
            .send(Event::Command(cmd))
            .await
            .map_err(|_| anyhow!("station core is not running"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StationUpdate> {
        self.updates.subscribe()
    }

    pub async fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown).await;
    }
}

// ── StationCore ───────────────────────────────────────────────────────────────

pub struct StationCore<O: AudioOutput, S: TrackSource> {
    engine: Engine,
    output: O,
    source: Arc<S>,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    audio_rx: Option<mpsc::Receiver<AudioEvent>>,
    view: Arc<RwLock<Published>>,
    updates: broadcast::Sender<StationUpdate>,
    /// The one pending stage timer, if any.
    stage_timer: Option<AbortHandle>,
    /// How many log entries have been published so far.
    published_logs: usize,
}

impl<O: AudioOutput, S: TrackSource> StationCore<O, S> {
    /// `audio_rx` is the receiving end of the channel `output` reports on.
    pub fn new(
        engine: Engine,
        output: O,
        source: S,
        audio_rx: mpsc::Receiver<AudioEvent>,
    ) -> (Self, StationHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let view = Arc::new(RwLock::new(Published {
            snapshot: engine.snapshot(),
            log: engine.log().iter().cloned().collect(),
        }));
        let published_logs = engine.log().len();

        let handle = StationHandle {
            events: event_tx.clone(),
            view: Arc::clone(&view),
            updates: updates.clone(),
        };
        let core = Self {
            engine,
            output,
            source: Arc::new(source),
            event_tx,
            event_rx,
            audio_rx: Some(audio_rx),
            view,
            updates,
            stage_timer: None,
            published_logs,
        };
        (core, handle)
    }

    /// Run until a `Shutdown` event arrives.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("StationCore: starting event loop");

        // Forward audio observations into the event stream.
        let forwarder = self.audio_rx.take().map(|mut audio_rx| {
            let audio_tx = self.event_tx.clone();
            tokio::spawn(async move {
                while let Some(evt) = audio_rx.recv().await {
                    if audio_tx.send(Event::Audio(evt)).await.is_err() {
                        break;
                    }
                }
            })
        });

        let effects = self.engine.start();
        self.apply(effects).await;
        self.publish().await;

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("StationCore: event channel closed, shutting down");
                break;
            };
            let shutdown = matches!(event, Event::Shutdown);
            match &event {
                Event::Audio(AudioEvent::TimeUpdate { .. }) => {}
                Event::Command(cmd) => info!("StationCore: command {:?}", cmd),
                other => debug!("StationCore: event {:?}", other),
            }

            let effects = self.engine.handle(event);
            self.apply(effects).await;
            self.publish().await;

            if shutdown {
                info!("StationCore: shutdown requested");
                break;
            }
        }

        if let Some(timer) = self.stage_timer.take() {
            timer.abort();
        }
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        Ok(())
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Schedule { generation, delay } => {
                    if let Some(timer) = self.stage_timer.take() {
                        timer.abort();
                    }
                    let tx = self.event_tx.clone();
                    let task = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Event::StageDue { generation }).await;
                    });
                    self.stage_timer = Some(task.abort_handle());
                }
                Effect::FetchCatalog { limit } => {
                    let source = Arc::clone(&self.source);
                    let tx = self.event_tx.clone();
                    tokio::spawn(async move {
                        let fetched = source.fetch_agent_tracks(limit).await;
                        let _ = tx.send(Event::CatalogFetched(fetched)).await;
                    });
                }
                Effect::Playback(cmd) => {
                    if let Some(outcome) = self.drive_output(cmd).await {
                        queue.extend(self.engine.handle(outcome));
                    }
                }
            }
        }
    }

    /// Issue one command on the output.  A play returns its outcome as an
    /// event to be fed straight back into the engine.
    async fn drive_output(&mut self, cmd: PlaybackCommand) -> Option<Event> {
        let result = match cmd {
            PlaybackCommand::Load { load_id, url } => {
                debug!("StationCore: load #{} {}", load_id, url);
                self.output.load(load_id, &url).await
            }
            PlaybackCommand::Play { load_id } => {
                let result = self.output.play().await.map_err(|e| e.to_string());
                return Some(Event::PlayOutcome { load_id, result });
            }
            PlaybackCommand::Pause => self.output.pause().await,
            PlaybackCommand::Seek { secs, .. } => self.output.seek(secs).await,
            PlaybackCommand::SetMuted(muted) => self.output.set_muted(muted).await,
        };
        if let Err(e) = result {
            warn!("StationCore: audio output error: {}", e);
        }
        None
    }

    async fn publish(&mut self) {
        let snapshot = self.engine.snapshot();
        let fresh: Vec<LogEntry> = self.engine.log().since(self.published_logs).to_vec();
        self.published_logs = self.engine.log().len();
        {
            let mut view = self.view.write().await;
            view.snapshot = snapshot.clone();
            view.log.extend(fresh.iter().cloned());
        }
        for entry in fresh {
            let _ = self.updates.send(StationUpdate::LogAppended(entry));
        }
        let _ = self.updates.send(StationUpdate::StateUpdated(snapshot));
    }
}
