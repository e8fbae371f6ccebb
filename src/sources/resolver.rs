use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{
    links::{InputKind, LinkMatcher, SpotifyResource},
    spotify::SpotifyClient,
};
use crate::{
    common::types::UserId,
    engine::{LoadType, TrackLoader},
    player::Track,
};

/// Engine prefix for text searches.
pub const SEARCH_PREFIX: &str = "ytsearch:";

/// Turns a link or free text into playable tracks.
pub struct TrackResolver {
    loader: Arc<dyn TrackLoader>,
    spotify: Option<SpotifyClient>,
    links: LinkMatcher,
}

impl TrackResolver {
    pub fn new(loader: Arc<dyn TrackLoader>, spotify: Option<SpotifyClient>) -> Self {
        Self {
            loader,
            spotify,
            links: LinkMatcher::new(),
        }
    }

    /// Resolves `input` for `requester`. `None` means nothing playable was
    /// found; a returned list is never empty.
    pub async fn resolve(&self, input: &str, requester: UserId) -> Option<Vec<Track>> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        match self.links.classify(input) {
            InputKind::Short => {
                warn!("YouTube shorts are not supported: {}", input);
                return None;
            }
            InputKind::Direct => {
                if let Some(tracks) = self.load_link(input, requester).await {
                    return Some(tracks);
                }
                debug!("Direct load of {} failed; searching instead", input);
            }
            InputKind::Spotify(resource) => {
                if let Some(tracks) = self.load_spotify(&resource, requester).await {
                    return Some(tracks);
                }
                debug!("Spotify lookup of {} failed; searching instead", input);
            }
            InputKind::UnsupportedLink | InputKind::Query => {}
        }

        self.search(input, requester).await.map(|t| vec![t])
    }

    /// Loads a supported link directly; playlists yield every track.
    async fn load_link(&self, link: &str, requester: UserId) -> Option<Vec<Track>> {
        let result = match self.loader.load_tracks(link).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to load {}: {}", link, e);
                return None;
            }
        };

        let tracks: Vec<Track> = match result.load_type {
            LoadType::PlaylistLoaded => result
                .tracks
                .into_iter()
                .map(|t| Track::from_loaded(t, requester))
                .collect(),
            LoadType::TrackLoaded | LoadType::SearchResult => result
                .tracks
                .into_iter()
                .next()
                .map(|t| Track::from_loaded(t, requester))
                .into_iter()
                .collect(),
            LoadType::NoMatches | LoadType::LoadFailed => Vec::new(),
        };

        (!tracks.is_empty()).then_some(tracks)
    }

    /// First search result for `query`.
    pub async fn search(&self, query: &str, requester: UserId) -> Option<Track> {
        let identifier = format!("{}{}", SEARCH_PREFIX, query);
        let result = match self.loader.load_tracks(&identifier).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                return None;
            }
        };

        match result.load_type {
            LoadType::NoMatches | LoadType::LoadFailed => None,
            _ => result
                .tracks
                .into_iter()
                .next()
                .map(|t| Track::from_loaded(t, requester)),
        }
    }

    async fn load_spotify(&self, resource: &SpotifyResource, requester: UserId) -> Option<Vec<Track>> {
        let spotify = self.spotify.as_ref()?;

        if let SpotifyResource::Track(id) = resource {
            let track = spotify.fetch_track(id).await?;
            return self
                .search(&track.search_query(), requester)
                .await
                .map(|t| vec![t]);
        }

        let tracks = spotify.fetch_collection(resource).await?;
        let semaphore = Arc::new(Semaphore::new(spotify.track_resolve_concurrency()));
        let futs = tracks.iter().map(|track| {
            let semaphore = semaphore.clone();
            let query = track.search_query();
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                let found = self.search(&query, requester).await;
                if found.is_none() {
                    warn!("Dropping '{}': no match", query);
                }
                found
            }
        });

        let resolved: Vec<Track> = join_all(futs).await.into_iter().flatten().collect();
        debug!(
            "Resolved {}/{} Spotify tracks for {:?}",
            resolved.len(),
            tracks.len(),
            resource
        );
        (!resolved.is_empty()).then_some(resolved)
    }
}
