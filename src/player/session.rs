use std::{collections::VecDeque, sync::Arc};

use rand::Rng;

use super::Track;
use crate::{
    common::types::{ChannelId, GuildId, MessageId},
    engine::EnginePlayer,
};

/// Where playback announcements for a guild go: the text channel of the
/// command that started playback, replying to that command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceTarget {
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
}

/// Playback state for one guild. Exists only while the guild is active, so
/// the player handle is never absent.
#[derive(Clone)]
pub struct GuildPlaybackSession {
    /// Distinguishes this session from earlier ones for the same guild.
    pub generation: u64,
    pub guild_id: GuildId,
    /// Head is the playing or about-to-play track.
    pub queue: VecDeque<Track>,
    pub player: Arc<dyn EnginePlayer>,
    pub loop_enabled: bool,
    pub announce: AnnounceTarget,
    /// The guild's continuation loop is alive.
    pub playback_running: bool,
    /// The next track end restarts from the head instead of popping it.
    pub restart_pending: bool,
}

impl GuildPlaybackSession {
    pub fn new(
        generation: u64,
        guild_id: GuildId,
        player: Arc<dyn EnginePlayer>,
        announce: AnnounceTarget,
    ) -> Self {
        Self {
            generation,
            guild_id,
            queue: VecDeque::new(),
            player,
            loop_enabled: false,
            announce,
            playback_running: false,
            restart_pending: false,
        }
    }

    /// Appends tracks, returning whether the queue was empty before.
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = Track>) -> bool {
        let was_empty = self.queue.is_empty();
        self.queue.extend(tracks);
        was_empty
    }

    pub fn head(&self) -> Option<&Track> {
        self.queue.front()
    }

    /// Applies a track end to the queue. The finished head is dropped, or
    /// moved to the tail when looping. A pending restart leaves the queue
    /// alone.
    pub fn complete_head(&mut self) {
        if std::mem::take(&mut self.restart_pending) {
            return;
        }
        if let Some(previous) = self.queue.pop_front() {
            if self.loop_enabled {
                self.queue.push_back(previous);
            }
        }
    }

    /// Random-key sort of the whole queue, head included.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut keyed: Vec<(u64, Track)> = self
            .queue
            .drain(..)
            .map(|track| (rng.gen_range(0..u64::MAX), track))
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        self.queue = keyed.into_iter().map(|(_, track)| track).collect();
    }

    /// Whether commands that need something playing may act on this session.
    pub fn is_active(&self) -> bool {
        self.player.is_playing() && !self.queue.is_empty()
    }
}
