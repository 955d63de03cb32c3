//! Remote catalog seam: where agent-made songs come from.

use std::future::Future;

use serde::Deserialize;

use crate::error::CatalogError;

/// A song as listed by the remote catalog.  Only the title is guaranteed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentSong {
    pub title: String,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
    #[serde(default)]
    pub genre: Option<String>,
}

/// Listings embed the artist either as a bare name or as an artist record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArtistRef {
    Name(String),
    Record {
        #[serde(default)]
        name: Option<String>,
    },
}

impl AgentSong {
    pub fn artist_name(&self) -> Option<&str> {
        let name = match self.artist.as_ref()? {
            ArtistRef::Name(name) => name.as_str(),
            ArtistRef::Record { name } => name.as_deref()?,
        };
        (!name.trim().is_empty()).then_some(name)
    }

    pub fn genre_name(&self) -> Option<&str> {
        self.genre.as_deref().filter(|g| !g.trim().is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SongListing {
    Bare(Vec<AgentSong>),
    Wrapped { songs: Vec<AgentSong> },
}

/// Decode a listing body (`[...]` or `{"songs": [...]}`), keeping at most `limit`.
pub fn parse_agent_songs(body: &[u8], limit: usize) -> Result<Vec<AgentSong>, CatalogError> {
    let listing: SongListing = serde_json::from_slice(body)?;
    let mut songs = match listing {
        SongListing::Bare(songs) => songs,
        SongListing::Wrapped { songs } => songs,
    };
    songs.truncate(limit);
    Ok(songs)
}

/// External collaborator that lists additional agent tracks.
pub trait TrackSource: Send + Sync + 'static {
    fn fetch_agent_tracks(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<AgentSong>, CatalogError>> + Send;
}
