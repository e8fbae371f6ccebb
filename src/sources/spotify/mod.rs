use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

pub mod models;
pub mod token;

use self::{
    models::{ApiErrorBody, Paging, SpotifyTrack, TrackCollection},
    token::SpotifyTokenTracker,
};
use crate::{configs::SpotifyConfig, sources::links::SpotifyResource};

/// Upper bound on followed `next` links for one album or playlist.
const MAX_COLLECTION_PAGES: usize = 20;

/// Web API metadata client authenticated with client credentials.
pub struct SpotifyClient {
    client: reqwest::Client,
    api_base: String,
    token: SpotifyTokenTracker,
    track_resolve_concurrency: usize,
}

impl SpotifyClient {
    /// `None` when client credentials are not configured.
    pub fn new(client: reqwest::Client, config: &SpotifyConfig) -> Option<Self> {
        let (client_id, client_secret) = config.credentials()?;
        Some(Self {
            token: SpotifyTokenTracker::new(
                client.clone(),
                &config.accounts_base,
                client_id,
                client_secret,
            ),
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            track_resolve_concurrency: config.track_resolve_concurrency.max(1),
        })
    }

    pub fn track_resolve_concurrency(&self) -> usize {
        self.track_resolve_concurrency
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let token = self.token.get_token().await?;
        let resp = match self.client.get(url).bearer_auth(token).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("Spotify request to {} failed: {}", url, e);
                return None;
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read Spotify response: {}", e);
                return None;
            }
        };

        if !status.is_success() {
            match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => warn!(
                    "Spotify returned {}: {}",
                    err.error.status, err.error.message
                ),
                Err(_) => warn!("Spotify returned {} for {}", status, url),
            }
            return None;
        }

        match serde_json::from_str(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("Failed to decode Spotify response from {}: {}", url, e);
                None
            }
        }
    }

    pub async fn fetch_track(&self, id: &str) -> Option<SpotifyTrack> {
        self.get_json(&format!("{}/tracks/{}", self.api_base, id))
            .await
    }

    /// All tracks of an album or playlist, following pagination.
    pub async fn fetch_collection(&self, resource: &SpotifyResource) -> Option<Vec<SpotifyTrack>> {
        let url = match resource {
            SpotifyResource::Album(id) => format!("{}/albums/{}", self.api_base, id),
            SpotifyResource::Playlist(id) => format!("{}/playlists/{}", self.api_base, id),
            SpotifyResource::Track(id) => return self.fetch_track(id).await.map(|t| vec![t]),
        };

        let collection: TrackCollection = self.get_json(&url).await?;
        debug!(
            "Loaded Spotify collection '{}'",
            collection.name.as_deref().unwrap_or("unknown")
        );

        let mut tracks: Vec<SpotifyTrack> = collection
            .tracks
            .items
            .iter()
            .filter_map(SpotifyTrack::from_item)
            .collect();

        let mut next = collection.tracks.next;
        let mut pages = 1;
        while let Some(next_url) = next.take() {
            if pages >= MAX_COLLECTION_PAGES {
                warn!("Stopping after {} pages of {}", pages, url);
                break;
            }
            let Some(page) = self.get_json::<Paging>(&next_url).await else {
                break;
            };
            tracks.extend(page.items.iter().filter_map(SpotifyTrack::from_item));
            next = page.next;
            pages += 1;
        }

        Some(tracks)
    }
}
