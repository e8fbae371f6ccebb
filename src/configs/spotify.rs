use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_track_resolve_concurrency")]
    pub track_resolve_concurrency: usize,
    #[serde(default = "default_accounts_base")]
    pub accounts_base: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl SpotifyConfig {
    /// Both halves of the client credentials, if configured and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;
        Some((id, secret))
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            track_resolve_concurrency: default_track_resolve_concurrency(),
            accounts_base: default_accounts_base(),
            api_base: default_api_base(),
        }
    }
}

fn default_track_resolve_concurrency() -> usize {
    50
}

fn default_accounts_base() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_api_base() -> String {
    "https://api.spotify.com/v1".to_string()
}
