//! Simulated playback primitive: a clock with no sound behind it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clawfm_engine::output::{AudioEvent, AudioOutput};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
struct Transport {
    load_id: u64,
    loaded: bool,
    playing: bool,
    position: f64,
}

/// Every loaded track lasts `track_secs`.  Position advances every 250 ms
/// while playing and the track ends when it reaches the duration.
pub struct SilentOutput {
    track_secs: f64,
    audio_tx: mpsc::Sender<AudioEvent>,
    transport: Arc<Mutex<Transport>>,
    ticker: Option<JoinHandle<()>>,
}

impl SilentOutput {
    pub fn new(track_secs: f64, audio_tx: mpsc::Sender<AudioEvent>) -> Self {
        Self {
            track_secs,
            audio_tx,
            transport: Arc::new(Mutex::new(Transport::default())),
            ticker: None,
        }
    }

    fn with_transport<T>(&self, f: impl FnOnce(&mut Transport) -> T) -> anyhow::Result<T> {
        let mut transport = self
            .transport
            .lock()
            .map_err(|_| anyhow::anyhow!("silent transport poisoned"))?;
        Ok(f(&mut transport))
    }

    fn ensure_ticker(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let audio_tx = self.audio_tx.clone();
        let duration = self.track_secs;
        self.ticker = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(TICK).await;
                let event = {
                    let Ok(mut t) = transport.lock() else { break };
                    if !t.playing {
                        continue;
                    }
                    t.position = (t.position + TICK.as_secs_f64()).min(duration);
                    if t.position >= duration {
                        t.playing = false;
                        t.loaded = false;
                        AudioEvent::Ended { load_id: t.load_id }
                    } else {
                        AudioEvent::TimeUpdate {
                            load_id: t.load_id,
                            position: t.position,
                            duration: Some(duration),
                        }
                    }
                };
                if audio_tx.send(event).await.is_err() {
                    break;
                }
            }
        }));
    }
}

impl AudioOutput for SilentOutput {
    async fn load(&mut self, load_id: u64, url: &str) -> anyhow::Result<()> {
        debug!("silent: load #{} {}", load_id, url);
        self.ensure_ticker();
        self.with_transport(|t| {
            *t = Transport {
                load_id,
                loaded: true,
                ..Transport::default()
            };
        })?;
        self.audio_tx
            .send(AudioEvent::MetadataReady {
                load_id,
                duration: self.track_secs,
            })
            .await
            .map_err(|_| anyhow::anyhow!("audio event receiver gone"))
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        let loaded = self.with_transport(|t| {
            t.playing = t.loaded;
            t.loaded
        })?;
        if !loaded {
            anyhow::bail!("nothing loaded");
        }
        Ok(())
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.with_transport(|t| t.playing = false)
    }

    async fn seek(&mut self, secs: f64) -> anyhow::Result<()> {
        let duration = self.track_secs;
        self.with_transport(|t| t.position = secs.clamp(0.0, duration))
    }

    async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()> {
        debug!("silent: muted={}", muted);
        Ok(())
    }
}

impl Drop for SilentOutput {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_load_reports_duration_and_ticks_while_playing() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut out = SilentOutput::new(10.0, tx);
        out.load(3, "https://audio.test/a.mp3").await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(AudioEvent::MetadataReady {
                load_id: 3,
                duration: 10.0
            })
        );

        // paused: no ticks
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        out.seek(5.0).await.unwrap();
        out.play().await.unwrap();
        match rx.recv().await {
            Some(AudioEvent::TimeUpdate {
                load_id,
                position,
                duration,
            }) => {
                assert_eq!(load_id, 3);
                assert_eq!(position, 5.25);
                assert_eq!(duration, Some(10.0));
            }
            other => panic!("expected time update, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_ends_once() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut out = SilentOutput::new(1.0, tx);
        out.load(1, "a").await.unwrap();
        out.play().await.unwrap();

        let mut events = Vec::new();
        tokio::time::sleep(Duration::from_secs(3)).await;
        while let Ok(evt) = rx.try_recv() {
            events.push(evt);
        }
        let ended = events
            .iter()
            .filter(|e| **e == AudioEvent::Ended { load_id: 1 })
            .count();
        assert_eq!(ended, 1);
        assert!(out.play().await.is_err(), "ended track has to be reloaded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_tags_ticks_with_new_load() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut out = SilentOutput::new(10.0, tx);
        out.load(1, "a").await.unwrap();
        out.play().await.unwrap();
        out.load(2, "b").await.unwrap();
        out.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut ticks = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            if let AudioEvent::TimeUpdate { load_id, .. } = evt {
                ticks.push(load_id);
            }
        }
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|id| *id == 2));
    }

    #[tokio::test]
    async fn test_play_before_load_is_rejected() {
        let (tx, _rx) = mpsc::channel(4);
        let mut out = SilentOutput::new(10.0, tx);
        assert!(out.play().await.is_err());
    }
}
