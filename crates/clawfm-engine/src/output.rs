//! Seam between the engine and whatever actually makes sound.

use std::future::Future;

/// Observations pushed by an [`AudioOutput`] through the channel it was
/// built with.
///
/// Every event names the `load_id` of the track it describes, as passed to
/// [`AudioOutput::load`].  The engine drops events for any other load.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Duration of the freshly loaded track is known.
    MetadataReady { load_id: u64, duration: f64 },
    TimeUpdate {
        load_id: u64,
        position: f64,
        duration: Option<f64>,
    },
    /// The track played through to its end.
    Ended { load_id: u64 },
}

/// The playback primitive.  Implementations report progress through an
/// `mpsc::Sender<AudioEvent>` handed to them at construction.
///
/// `load` must leave the new track paused; only `play` starts audio.
pub trait AudioOutput: Send + 'static {
    /// Every event about this track afterwards carries `load_id`.
    fn load(&mut self, load_id: u64, url: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
    /// May be rejected (device busy, process gone, policy).  The engine
    /// treats a rejection as "not playing" and waits for the user.
    fn play(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn pause(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn seek(&mut self, secs: f64) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn set_muted(&mut self, muted: bool) -> impl Future<Output = anyhow::Result<()>> + Send;
}
