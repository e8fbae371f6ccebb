use std::sync::Arc;

use base64::prelude::*;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};

use super::models::TokenResponse;
use crate::common::types::{SharedRw, now_ms};

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_MS: u64 = 5_000;

#[derive(Clone, Debug)]
pub struct SpotifyToken {
    pub access_token: String,
    pub expiry_ms: u64,
}

/// Process-wide client credentials token.
///
/// Concurrent callers that find the token missing or stale wait on one
/// refresh instead of each requesting their own.
pub struct SpotifyTokenTracker {
    client: reqwest::Client,
    token_url: String,
    basic_auth: String,
    token: SharedRw<Option<SpotifyToken>>,
    refresh_lock: Mutex<()>,
}

impl SpotifyTokenTracker {
    pub fn new(
        client: reqwest::Client,
        accounts_base: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            client,
            token_url: format!("{}/api/token", accounts_base.trim_end_matches('/')),
            basic_auth: BASE64_STANDARD.encode(format!("{}:{}", client_id, client_secret)),
            token: Arc::new(RwLock::new(None)),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn cached(&self) -> Option<String> {
        let token_lock = self.token.read().await;
        token_lock
            .as_ref()
            .filter(|t| t.expiry_ms > now_ms() + EXPIRY_MARGIN_MS)
            .map(|t| t.access_token.clone())
    }

    pub async fn get_token(&self) -> Option<String> {
        if let Some(token) = self.cached().await {
            return Some(token);
        }

        let _refreshing = self.refresh_lock.lock().await;
        // Someone else may have refreshed while we waited.
        if let Some(token) = self.cached().await {
            return Some(token);
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Option<String> {
        debug!("Requesting Spotify client credentials token...");
        let request = self
            .client
            .post(&self.token_url)
            .header("Authorization", format!("Basic {}", self.basic_auth))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials");

        let resp = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to reach Spotify token endpoint: {}", e);
                return None;
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Spotify token endpoint returned {}: {}", status, body);
            return None;
        }

        let parsed: TokenResponse = match resp.json().await {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to parse Spotify token response: {}", e);
                return None;
            }
        };

        let expiry_ms = now_ms() + parsed.expires_in * 1_000;
        let mut token_lock = self.token.write().await;
        *token_lock = Some(SpotifyToken {
            access_token: parsed.access_token.clone(),
            expiry_ms,
        });

        debug!(
            "Refreshed Spotify {} token. Expiry: {}",
            parsed.token_type, expiry_ms
        );
        Some(parsed.access_token)
    }

    #[cfg(test)]
    pub(crate) async fn set_token(&self, token: SpotifyToken) {
        *self.token.write().await = Some(token);
    }
}
