use serde::Deserialize;
use serde_json::Value;

/// Client credentials token response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

impl SpotifyTrack {
    /// Search text for the engine: `"<title> by <artist>, <artist>"`.
    pub fn search_query(&self) -> String {
        let artists = self
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} by {}", self.name, artists)
    }

    /// Reads a collection item: album items are tracks, playlist items wrap
    /// the track in `track` (which is `null` for removed local files).
    pub fn from_item(item: &Value) -> Option<Self> {
        let track = if item.get("artists").is_some() {
            item
        } else {
            item.get("track").filter(|t| !t.is_null())?
        };
        serde_json::from_value(track.clone()).ok()
    }
}

/// One page of a track collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Albums and playlists both embed their first page under `tracks`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackCollection {
    #[serde(default)]
    pub name: Option<String>,
    pub tracks: Paging,
}

/// Error body of the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}
