pub mod models;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

pub use models::*;

use crate::common::types::{ChannelId, GuildId, UserId};

/// Longest message content the API accepts.
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// Thin client for the handful of platform REST calls the bot makes.
///
/// Every call returns `None` on failure after logging why; callers treat a
/// missing value as "not available right now".
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    api_base: String,
    token: String,
}

impl RestClient {
    pub fn new(client: Client, api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }

    async fn execute<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Option<T> {
        let resp = match self.authorized(request).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("{} request failed: {}", what, e);
                return None;
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read {} response: {}", what, e);
                return None;
            }
        };

        if !status.is_success() {
            match serde_json::from_str::<ApiError>(&body) {
                Ok(api) => warn!(
                    "{} returned {} (code {}): {}",
                    what, status, api.code, api.message
                ),
                Err(_) => warn!("{} returned {}", what, status),
            }
            return None;
        }

        match serde_json::from_str(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("Failed to decode {} response: {}", what, e);
                None
            }
        }
    }

    pub async fn get_gateway_bot(&self) -> Option<GatewayBot> {
        self.execute("get_gateway_bot", self.client.get(self.url("/gateway/bot")))
            .await
    }

    pub async fn get_channel(&self, channel_id: ChannelId) -> Option<Channel> {
        self.execute(
            "get_channel",
            self.client.get(self.url(&format!("/channels/{}", channel_id))),
        )
        .await
    }

    /// Moves a member to `channel_id`, or disconnects them with `None`.
    pub async fn move_guild_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: Option<ChannelId>,
    ) -> Option<serde_json::Value> {
        let body = serde_json::json!({ "channel_id": channel_id });
        self.execute(
            "move_guild_member",
            self.client
                .patch(self.url(&format!("/guilds/{}/members/{}", guild_id, user_id)))
                .json(&body),
        )
        .await
    }

    pub async fn create_message(
        &self,
        channel_id: ChannelId,
        message: &CreateMessage,
    ) -> Option<Message> {
        if message.content_len() > MAX_CONTENT_LENGTH {
            warn!(
                "Refusing to send {} chars to channel {}",
                message.content_len(),
                channel_id
            );
            return None;
        }

        debug!("Sending message to channel {}", channel_id);
        self.execute(
            "create_message",
            self.client
                .post(self.url(&format!("/channels/{}/messages", channel_id)))
                .json(message),
        )
        .await
    }
}
