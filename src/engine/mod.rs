//! Audio engine surface used by the playback orchestrator, plus the Lavalink
//! node client that implements it.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::common::{
    errors::EngineError,
    types::{ChannelId, GuildId},
};

pub mod node;
pub mod player;
pub mod protocol;
pub mod rest;

pub use node::LavalinkNode;
pub use player::LavalinkPlayer;
pub use protocol::{LoadTracksResponse, LoadType, LoadedTrack, TrackEndReason};
pub use rest::LavalinkRest;

/// Lifecycle signals for the track a subscription was created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    TrackStart,
    TrackEnd { reason: TrackEndReason },
    TrackStuck { threshold_ms: u64 },
    TrackException { message: String },
    /// The bot left voice (kicked, channel deleted, or disconnected).
    Disconnected,
    /// The bot was moved to another voice channel.
    ChannelMove { channel_id: ChannelId },
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrackStart => "trackStart",
            Self::TrackEnd { .. } => "trackEnd",
            Self::TrackStuck { .. } => "trackStuck",
            Self::TrackException { .. } => "trackException",
            Self::Disconnected => "disconnected",
            Self::ChannelMove { .. } => "channelMove",
        }
    }
}

/// Events for one `play` call.
///
/// Each `play` replaces the player's sender, so every older subscription sees
/// its stream end. Dropping the subscription unsubscribes.
pub struct TrackSubscription {
    rx: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl TrackSubscription {
    /// Returns the sending half the engine should publish to.
    pub fn channel() -> (mpsc::UnboundedSender<PlayerEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next event, or `None` once the engine dropped this subscription.
    pub async fn next(&mut self) -> Option<PlayerEvent> {
        self.rx.recv().await
    }

    pub fn off(self) {}
}

/// A guild's handle on the engine.
#[async_trait]
pub trait EnginePlayer: Send + Sync {
    fn guild_id(&self) -> GuildId;

    /// Joins (or rejoins) a voice channel.
    async fn connect(&self, channel_id: ChannelId) -> Result<(), EngineError>;

    /// Starts `encoded` and returns a fresh subscription for it.
    async fn play(&self, encoded: &str) -> Result<TrackSubscription, EngineError>;

    async fn pause(&self) -> Result<(), EngineError>;

    async fn resume(&self) -> Result<(), EngineError>;

    /// Stops the current track; the engine reports it as a track end.
    async fn stop(&self) -> Result<(), EngineError>;

    /// Releases the player. Open subscriptions end.
    async fn destroy(&self) -> Result<(), EngineError>;

    /// Leaves the voice channel.
    async fn disconnect(&self) -> Result<(), EngineError>;

    fn is_playing(&self) -> bool;
}

/// Creates players bound to a guild.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    async fn create_player(
        &self,
        guild_id: GuildId,
    ) -> Result<std::sync::Arc<dyn EnginePlayer>, EngineError>;
}

/// The engine's search and link loading API.
#[async_trait]
pub trait TrackLoader: Send + Sync {
    async fn load_tracks(&self, identifier: &str) -> Result<LoadTracksResponse, EngineError>;
}
