use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::types::{ChannelId, GuildId, MessageId, UserId};

/// `GET /gateway/bot`
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    #[serde(default)]
    pub shards: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// A message as returned by REST and carried by `MESSAGE_CREATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// Only present on gateway copies.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub content: String,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn described(color: u32, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            color: Some(color),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReference {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub fail_if_not_exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    pub replied_user: bool,
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Value>,
}

impl CreateMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    /// Replies to `message` without pinging its author.
    pub fn reply_to(mut self, channel_id: ChannelId, message_id: MessageId) -> Self {
        self.message_reference = Some(MessageReference {
            message_id,
            channel_id,
            fail_if_not_exists: false,
        });
        self.allowed_mentions = Some(AllowedMentions {
            parse: vec!["users".to_string()],
            replied_user: false,
        });
        self
    }

    pub fn components(mut self, components: Value) -> Self {
        self.components = Some(components);
        self
    }

    pub fn content_len(&self) -> usize {
        self.content.as_deref().map_or(0, |c| c.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_suppresses_mention() {
        let body = CreateMessage::text("hi").reply_to(ChannelId(5), MessageId(9));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["message_reference"]["message_id"], "9");
        assert_eq!(value["allowed_mentions"]["replied_user"], false);
        assert!(value.get("embeds").is_none());
    }

    #[test]
    fn test_embed_omits_empty_parts() {
        let body = CreateMessage::embed(Embed::described(0x2F3136, "hello"));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["embeds"][0]["description"], "hello");
        assert!(value["embeds"][0].get("fields").is_none());
        assert!(value["embeds"][0].get("title").is_none());
    }

    #[test]
    fn test_channel_parses_without_guild() {
        let channel: Channel = serde_json::from_str(r#"{"id":"12","type":1}"#).unwrap();
        assert_eq!(channel.id, ChannelId(12));
        assert!(channel.guild_id.is_none());
    }
}
