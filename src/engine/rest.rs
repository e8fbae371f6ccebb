use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{LoadTracksResponse, TrackLoader};
use crate::common::errors::EngineError;

/// HTTP side of the node: track loading and search.
#[derive(Clone)]
pub struct LavalinkRest {
    client: Client,
    base_url: String,
    password: String,
}

impl LavalinkRest {
    pub fn new(client: Client, base_url: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl TrackLoader for LavalinkRest {
    async fn load_tracks(&self, identifier: &str) -> Result<LoadTracksResponse, EngineError> {
        let url = format!(
            "{}/loadtracks?identifier={}",
            self.base_url,
            urlencoding::encode(identifier)
        );
        debug!("Loading tracks: '{}'", identifier);

        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.password)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EngineError::Status(resp.status()));
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
