//! Guild playback: queue state, the per-guild continuation loop, and the
//! command-facing orchestrator.

use async_trait::async_trait;

use crate::common::types::{ChannelId, GuildId};

pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod registry;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod track;

pub use error::MusicError;
pub use orchestrator::{CommandOrigin, PlaybackOrchestrator, QUEUE_LISTING_LIMIT};
pub use registry::{GuildSessionRegistry, SessionSlot};
pub use session::{AnnounceTarget, GuildPlaybackSession};
pub use track::Track;

/// Messages the playback loop posts on its own.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn now_playing(&self, target: &AnnounceTarget, track: &Track);

    async fn finished(&self, target: &AnnounceTarget);

    async fn track_stuck(&self, target: &AnnounceTarget);
}

/// Finds the guild a channel belongs to.
#[async_trait]
pub trait ChannelLookup: Send + Sync {
    async fn guild_of(&self, channel_id: ChannelId) -> Option<GuildId>;
}
