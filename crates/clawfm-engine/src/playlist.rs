//! Playlist composition: seed tracks plus agent tracks, uniformly shuffled.

use clawfm_proto::protocol::Track;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::catalog::AgentSong;
use crate::error::{CatalogError, EngineError};

pub const UNKNOWN_ARTIST: &str = "Unknown Unit";
pub const AGENT_GENRE: &str = "AI_GEN";
pub const AGENT_FREQUENCY: &str = "AI-NET";

/// Ordered, never-empty list of tracks.  Replaced wholesale, never edited.
///
/// Only [`PlaylistComposer`] builds one, always from its non-empty seed list.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    #[cfg(test)]
    pub(crate) fn new(tracks: Vec<Track>) -> Result<Self, EngineError> {
        if tracks.is_empty() {
            return Err(EngineError::EmptyPlaylist);
        }
        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn agent_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_agent).count()
    }
}

/// Builds the working playlist from the seed list and the remote catalog.
#[derive(Debug, Clone)]
pub struct PlaylistComposer {
    seed: Vec<Track>,
    fallback_pool: Vec<String>,
    fetch_limit: usize,
}

impl PlaylistComposer {
    pub fn new(
        seed: Vec<Track>,
        fallback_pool: Vec<String>,
        fetch_limit: usize,
    ) -> Result<Self, EngineError> {
        if seed.is_empty() {
            return Err(EngineError::EmptyPlaylist);
        }
        if fallback_pool.is_empty() {
            return Err(EngineError::EmptyFallbackPool);
        }
        Ok(Self {
            seed,
            fallback_pool,
            fetch_limit,
        })
    }

    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    /// The unshuffled seed list, used while the first fetch is in flight.
    pub fn seed_playlist(&self) -> Playlist {
        Playlist {
            tracks: self.seed.clone(),
        }
    }

    /// Turn a catalog listing into playable agent tracks.
    pub fn map_agent_song<R: Rng + ?Sized>(&self, song: &AgentSong, rng: &mut R) -> Track {
        // the pool is non-empty by construction
        let url = self
            .fallback_pool
            .choose(rng)
            .cloned()
            .unwrap_or_default();
        Track {
            title: song.title.clone(),
            artist: song.artist_name().unwrap_or(UNKNOWN_ARTIST).to_string(),
            genre: song.genre_name().unwrap_or(AGENT_GENRE).to_string(),
            url,
            frequency: AGENT_FREQUENCY.to_string(),
            is_agent: true,
        }
    }

    /// Concatenate seeds with the mapped fetch result and Fisher–Yates shuffle
    /// the lot.  A failed fetch silently degrades to the seeds alone.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        fetched: Result<Vec<AgentSong>, CatalogError>,
        rng: &mut R,
    ) -> Playlist {
        let songs = match fetched {
            Ok(songs) => songs,
            Err(e) => {
                warn!("Agent track fetch failed, using seed tracks only: {}", e);
                Vec::new()
            }
        };

        let mut tracks = self.seed.clone();
        tracks.extend(
            songs
                .iter()
                .take(self.fetch_limit)
                .map(|song| self.map_agent_song(song, &mut *rng)),
        );
        tracks.shuffle(rng);

        info!(
            "Composed playlist: {} tracks ({} agent)",
            tracks.len(),
            tracks.len() - self.seed.len()
        );
        Playlist { tracks }
    }
}
