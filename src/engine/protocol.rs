use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::types::GuildId;

/// Messages sent to the node.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OutgoingOp {
    #[serde(rename_all = "camelCase")]
    VoiceUpdate {
        guild_id: GuildId,
        session_id: String,
        event: Value,
    },
    #[serde(rename_all = "camelCase")]
    Play { guild_id: GuildId, track: String },
    #[serde(rename_all = "camelCase")]
    Pause { guild_id: GuildId, pause: bool },
    #[serde(rename_all = "camelCase")]
    Stop { guild_id: GuildId },
    #[serde(rename_all = "camelCase")]
    Destroy { guild_id: GuildId },
}

/// Messages received from the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op")]
pub enum IncomingMessage {
    #[serde(rename = "event")]
    Event(NodeEvent),
    #[serde(rename = "playerUpdate", rename_all = "camelCase")]
    PlayerUpdate {
        guild_id: GuildId,
        #[serde(default)]
        state: PlayerState,
    },
    #[serde(rename = "stats")]
    Stats,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub connected: bool,
}

/// Player lifecycle events, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    #[serde(rename_all = "camelCase")]
    TrackStartEvent {
        guild_id: GuildId,
        #[serde(default)]
        track: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TrackEndEvent {
        guild_id: GuildId,
        #[serde(default)]
        track: Option<String>,
        reason: TrackEndReason,
    },
    #[serde(rename_all = "camelCase")]
    TrackExceptionEvent {
        guild_id: GuildId,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        exception: Option<TrackException>,
    },
    #[serde(rename_all = "camelCase")]
    TrackStuckEvent {
        guild_id: GuildId,
        #[serde(default)]
        threshold_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    WebSocketClosedEvent {
        guild_id: GuildId,
        code: u16,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        by_remote: bool,
    },
}

impl NodeEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackStartEvent { guild_id, .. }
            | Self::TrackEndEvent { guild_id, .. }
            | Self::TrackExceptionEvent { guild_id, .. }
            | Self::TrackStuckEvent { guild_id, .. }
            | Self::WebSocketClosedEvent { guild_id, .. } => *guild_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackEndReason {
    #[serde(alias = "finished")]
    Finished,
    #[serde(alias = "loadFailed")]
    LoadFailed,
    #[serde(alias = "stopped")]
    Stopped,
    #[serde(alias = "replaced")]
    Replaced,
    #[serde(alias = "cleanup")]
    Cleanup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackException {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Result type of `GET /loadtracks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    TrackLoaded,
    PlaylistLoaded,
    SearchResult,
    NoMatches,
    LoadFailed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTracksResponse {
    pub load_type: LoadType,
    #[serde(default)]
    pub tracks: Vec<LoadedTrack>,
    #[serde(default)]
    pub playlist_info: Option<PlaylistInfo>,
    #[serde(default)]
    pub exception: Option<TrackException>,
}

impl LoadTracksResponse {
    pub fn empty(load_type: LoadType) -> Self {
        Self {
            load_type,
            tracks: Vec::new(),
            playlist_info: None,
            exception: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadedTrack {
    /// Engine-encoded track payload.
    pub track: String,
    pub info: TrackInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub selected_track: Option<i64>,
}
