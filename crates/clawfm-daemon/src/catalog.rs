use std::time::Duration;

use clawfm_engine::catalog::{parse_agent_songs, AgentSong, TrackSource};
use clawfm_engine::CatalogError;
use clawfm_proto::config::CatalogConfig;
use tracing::{debug, info};

/// Lists agent-made songs from the configured HTTP endpoint.
pub struct HttpCatalog {
    client: reqwest::Client,
    songs_url: String,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("clawfm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            songs_url: config.songs_url.trim().to_string(),
        })
    }
}

impl TrackSource for HttpCatalog {
    async fn fetch_agent_tracks(&self, limit: usize) -> Result<Vec<AgentSong>, CatalogError> {
        if self.songs_url.is_empty() {
            return Err(CatalogError::Unavailable);
        }
        debug!("catalog: GET {} limit={}", self.songs_url, limit);
        let resp = self
            .client
            .get(&self.songs_url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        let songs = parse_agent_songs(&body, limit)?;
        info!("catalog: fetched {} agent songs", songs.len());
        Ok(songs)
    }
}
