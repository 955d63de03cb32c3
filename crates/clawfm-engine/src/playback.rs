//! PlaybackController — bookkeeping around the audio primitive.
//!
//! The controller never talks to the primitive itself.  Every operation
//! returns the [`PlaybackCommand`] the driver should issue (or `None` when the
//! request already matches the current state), and every observation from the
//! primitive is fed back in through the `on_*` methods.

use clawfm_proto::protocol::{PlaybackState, Track};
use rand::Rng;
use tracing::{debug, warn};

/// Lower and upper bound of the live-tuning seek, as a fraction of duration.
pub const TUNE_MIN: f64 = 0.15;
pub const TUNE_MAX: f64 = 0.85;

/// Instruction for the audio primitive.
///
/// `load_id` ties a request to one particular track load so answers that
/// arrive after the next load can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    Load { load_id: u64, url: String },
    Play { load_id: u64 },
    Pause,
    Seek { load_id: u64, secs: f64 },
    SetMuted(bool),
}

#[derive(Debug, Default)]
pub struct PlaybackController {
    load_id: u64,
    url: Option<String>,
    is_playing: bool,
    /// A play request is out and its outcome has not come back yet.
    play_pending: bool,
    muted: bool,
    /// Live-tuning seek already applied for this load.
    tuned: bool,
    position: Option<f64>,
    duration: Option<f64>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_id(&self) -> u64 {
        self.load_id
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Whether `load_id` names the track loaded right now.
    pub fn is_current(&self, load_id: u64) -> bool {
        load_id != 0 && load_id == self.load_id
    }

    /// Swap in a new track.  Resets position, play state and the tuning guard.
    pub fn load_track(&mut self, track: &Track) -> PlaybackCommand {
        self.load_id += 1;
        self.url = Some(track.url.clone());
        self.is_playing = false;
        self.play_pending = false;
        self.tuned = false;
        self.position = None;
        self.duration = None;
        debug!("Playback: load #{} {}", self.load_id, track.url);
        PlaybackCommand::Load {
            load_id: self.load_id,
            url: track.url.clone(),
        }
    }

    /// User-initiated play.  Reported as playing straight away; a rejection
    /// arriving later flips it back.
    pub fn play(&mut self) -> Option<PlaybackCommand> {
        let cmd = self.start()?;
        self.is_playing = true;
        Some(cmd)
    }

    /// Workflow-initiated play.  `is_playing` only turns true once the
    /// primitive confirms.
    pub fn start(&mut self) -> Option<PlaybackCommand> {
        if self.is_playing || self.play_pending || self.url.is_none() {
            return None;
        }
        self.play_pending = true;
        Some(PlaybackCommand::Play {
            load_id: self.load_id,
        })
    }

    pub fn pause(&mut self) -> Option<PlaybackCommand> {
        if !self.is_playing && !self.play_pending {
            return None;
        }
        self.is_playing = false;
        self.play_pending = false;
        Some(PlaybackCommand::Pause)
    }

    pub fn set_muted(&mut self, muted: bool) -> Option<PlaybackCommand> {
        if self.muted == muted {
            return None;
        }
        self.muted = muted;
        Some(PlaybackCommand::SetMuted(muted))
    }

    /// Settle a play request.  Outcomes for an older load are dropped.
    pub fn on_play_outcome(&mut self, load_id: u64, result: Result<(), String>) {
        if load_id != self.load_id {
            debug!(
                "Playback: ignoring play outcome for superseded load #{} (current #{})",
                load_id, self.load_id
            );
            return;
        }
        match result {
            Ok(()) => {
                if self.play_pending {
                    self.is_playing = true;
                }
            }
            Err(reason) => {
                warn!("Playback: play rejected for load #{}: {}", load_id, reason);
                self.is_playing = false;
            }
        }
        self.play_pending = false;
    }

    /// First duration for this load.  Returns the tuning seek the first
    /// time a usable duration shows up, and never again until the next load.
    /// Durations reported for an older load are dropped.
    pub fn on_metadata_ready<R: Rng + ?Sized>(
        &mut self,
        load_id: u64,
        duration: f64,
        rng: &mut R,
    ) -> Option<PlaybackCommand> {
        if !self.is_current(load_id) {
            debug!(
                "Playback: ignoring metadata for superseded load #{} (current #{})",
                load_id, self.load_id
            );
            return None;
        }
        if usable(duration) {
            self.duration = Some(duration);
        }
        if self.tuned || !usable(duration) || self.url.is_none() {
            return None;
        }
        self.tuned = true;
        let fraction = rng.gen_range(TUNE_MIN..=TUNE_MAX);
        let secs = fraction * duration;
        debug!(
            "Playback: tuning into load #{} at {:.1}s of {:.1}s",
            self.load_id, secs, duration
        );
        Some(PlaybackCommand::Seek {
            load_id: self.load_id,
            secs,
        })
    }

    pub fn on_time_update(&mut self, load_id: u64, position: f64, duration: Option<f64>) {
        if !self.is_current(load_id) {
            return;
        }
        self.position = Some(position);
        if let Some(d) = duration {
            self.duration = Some(d);
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing,
            progress_percent: progress_percent(self.position, self.duration),
            current_time: format_clock(self.position),
            duration: format_clock(self.duration),
            muted: self.muted,
        }
    }
}

fn usable(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0
}

/// `M:SS` with unpadded minutes.  Missing, NaN, infinite or negative input
/// renders as `"00:00"`.
pub fn format_clock(secs: Option<f64>) -> String {
    match secs {
        Some(t) if t.is_finite() && t >= 0.0 => {
            let whole = t.floor() as u64;
            format!("{}:{:02}", whole / 60, whole % 60)
        }
        _ => "00:00".to_string(),
    }
}

/// Percentage of `duration` elapsed, clamped to `0..=100`.  Zero whenever
/// either side is missing or not a usable number.
pub fn progress_percent(position: Option<f64>, duration: Option<f64>) -> f64 {
    match (position, duration) {
        (Some(cur), Some(dur)) if usable(dur) && cur.is_finite() => {
            (cur / dur * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(url: &str) -> Track {
        Track {
            title: "Airglow".to_string(),
            artist: "Stellardrone".to_string(),
            genre: "AMBIENT".to_string(),
            url: url.to_string(),
            frequency: "88.4 Hz".to_string(),
            is_agent: false,
        }
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Some(75.0)), "1:15");
        assert_eq!(format_clock(Some(0.0)), "0:00");
        assert_eq!(format_clock(Some(59.9)), "0:59");
        assert_eq!(format_clock(Some(3600.0)), "60:00");
        assert_eq!(format_clock(Some(f64::NAN)), "00:00");
        assert_eq!(format_clock(Some(f64::INFINITY)), "00:00");
        assert_eq!(format_clock(Some(-3.0)), "00:00");
        assert_eq!(format_clock(None), "00:00");
    }

    #[test]
    fn test_progress_degenerate_durations() {
        assert_eq!(progress_percent(Some(10.0), Some(0.0)), 0.0);
        assert_eq!(progress_percent(Some(10.0), Some(f64::NAN)), 0.0);
        assert_eq!(progress_percent(Some(10.0), None), 0.0);
        assert_eq!(progress_percent(None, Some(100.0)), 0.0);
        assert_eq!(progress_percent(Some(25.0), Some(100.0)), 25.0);
        assert_eq!(progress_percent(Some(250.0), Some(100.0)), 100.0);
    }

    #[test]
    fn test_tuning_seek_once_per_load() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));

        let first = pc.on_metadata_ready(1, 200.0, &mut rng);
        match first {
            Some(PlaybackCommand::Seek { load_id, secs }) => {
                assert_eq!(load_id, 1);
                assert!((30.0..=170.0).contains(&secs), "seek {secs} out of window");
            }
            other => panic!("expected seek, got {other:?}"),
        }
        assert_eq!(pc.on_metadata_ready(1, 200.0, &mut rng), None);

        // a fresh load re-arms the guard
        pc.load_track(&track("b.mp3"));
        assert!(matches!(
            pc.on_metadata_ready(2, 120.0, &mut rng),
            Some(PlaybackCommand::Seek { load_id: 2, .. })
        ));
    }

    #[test]
    fn test_unusable_duration_does_not_consume_guard() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        assert_eq!(pc.on_metadata_ready(1, f64::NAN, &mut rng), None);
        assert_eq!(pc.on_metadata_ready(1, 0.0, &mut rng), None);
        assert!(pc.on_metadata_ready(1, 90.0, &mut rng).is_some());
    }

    #[test]
    fn test_workflow_start_waits_for_outcome() {
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        assert_eq!(pc.start(), Some(PlaybackCommand::Play { load_id: 1 }));
        assert!(!pc.is_playing());
        pc.on_play_outcome(1, Ok(()));
        assert!(pc.is_playing());
    }

    #[test]
    fn test_rejection_clears_optimistic_play() {
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        assert!(pc.play().is_some());
        assert!(pc.is_playing());
        pc.on_play_outcome(1, Err("autoplay blocked".to_string()));
        assert!(!pc.is_playing());
        assert!(!pc.state().is_playing);
    }

    #[test]
    fn test_stale_outcome_is_ignored() {
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        pc.start();
        pc.load_track(&track("b.mp3"));
        pc.on_play_outcome(1, Ok(()));
        assert!(!pc.is_playing());
    }

    #[test]
    fn test_toggles_are_idempotent() {
        let mut pc = PlaybackController::new();
        assert_eq!(pc.play(), None, "nothing loaded yet");
        assert_eq!(pc.pause(), None);
        pc.load_track(&track("a.mp3"));
        assert!(pc.play().is_some());
        assert_eq!(pc.play(), None);
        assert_eq!(pc.pause(), Some(PlaybackCommand::Pause));
        assert_eq!(pc.pause(), None);
        assert_eq!(pc.set_muted(false), None);
        assert_eq!(pc.set_muted(true), Some(PlaybackCommand::SetMuted(true)));
        assert_eq!(pc.set_muted(true), None);
    }

    #[test]
    fn test_mute_leaves_position_alone() {
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        pc.on_time_update(1, 42.0, Some(168.0));
        let before = pc.state();
        pc.set_muted(true);
        pc.set_muted(false);
        let after = pc.state();
        assert_eq!(before, after);
        assert_eq!(after.current_time, "0:42");
        assert_eq!(after.progress_percent, 25.0);
    }

    #[test]
    fn test_load_resets_progress() {
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        pc.on_time_update(1, 42.0, Some(168.0));
        pc.load_track(&track("b.mp3"));
        assert_eq!(pc.state().current_time, "00:00");
        assert_eq!(pc.state().progress_percent, 0.0);
    }

    #[test]
    fn test_events_for_previous_load_are_dropped() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pc = PlaybackController::new();
        pc.load_track(&track("a.mp3"));
        pc.load_track(&track("b.mp3"));

        // track a's duration and position arrive after b was loaded
        assert_eq!(pc.on_metadata_ready(1, 300.0, &mut rng), None);
        pc.on_time_update(1, 250.0, Some(300.0));
        assert_eq!(pc.state().current_time, "00:00");
        assert_eq!(pc.state().duration, "00:00");

        // b's own duration still gets the tuning seek, inside b's bounds
        match pc.on_metadata_ready(2, 120.0, &mut rng) {
            Some(PlaybackCommand::Seek { load_id: 2, secs }) => {
                assert!((18.0..=102.0).contains(&secs), "seek {secs} out of window");
            }
            other => panic!("expected seek, got {other:?}"),
        }
    }

    #[test]
    fn test_nothing_is_current_before_first_load() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pc = PlaybackController::new();
        assert!(!pc.is_current(0));
        assert_eq!(pc.on_metadata_ready(0, 100.0, &mut rng), None);
    }

    proptest! {
        #[test]
        fn prop_progress_is_bounded(cur in proptest::num::f64::ANY, dur in proptest::num::f64::ANY) {
            let p = progress_percent(Some(cur), Some(dur));
            prop_assert!((0.0..=100.0).contains(&p));
        }
    }
}
