use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{
    AnnounceTarget, Announcer, ChannelLookup, GuildPlaybackSession, GuildSessionRegistry,
    MusicError, Track,
    playback::{PlaybackLoop, playback_loop, teardown},
};
use crate::{
    common::types::{ChannelId, GuildId, MessageId, UserId},
    engine::AudioEngine,
    sources::TrackResolver,
    voice::VoiceStateStore,
};

/// Most entries a queue listing shows.
pub const QUEUE_LISTING_LIMIT: usize = 25;

/// Who issued a command and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOrigin {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
}

impl CommandOrigin {
    pub fn announce_target(&self) -> AnnounceTarget {
        AnnounceTarget {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }
}

/// Per-guild queue and player coordination behind the music commands.
pub struct PlaybackOrchestrator {
    registry: Arc<GuildSessionRegistry>,
    resolver: Arc<TrackResolver>,
    engine: Arc<dyn AudioEngine>,
    voice: Arc<VoiceStateStore>,
    channels: Arc<dyn ChannelLookup>,
    announcer: Arc<dyn Announcer>,
}

fn active(
    slot: &mut Option<GuildPlaybackSession>,
) -> Result<&mut GuildPlaybackSession, MusicError> {
    slot.as_mut()
        .filter(|s| s.is_active())
        .ok_or(MusicError::NothingPlaying)
}

impl PlaybackOrchestrator {
    pub fn new(
        registry: Arc<GuildSessionRegistry>,
        resolver: Arc<TrackResolver>,
        engine: Arc<dyn AudioEngine>,
        voice: Arc<VoiceStateStore>,
        channels: Arc<dyn ChannelLookup>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        Self {
            registry,
            resolver,
            engine,
            voice,
            channels,
            announcer,
        }
    }

    pub fn registry(&self) -> &Arc<GuildSessionRegistry> {
        &self.registry
    }

    /// The caller's guild and voice channel. The guild id is missing from
    /// voice states seeded before it was known, so fall back to the channel.
    async fn locate(&self, user_id: UserId) -> Result<(GuildId, ChannelId), MusicError> {
        let membership = self
            .voice
            .user_channel(user_id)
            .ok_or(MusicError::NotInVoice)?;

        let guild_id = match membership.guild_id {
            Some(guild_id) => Some(guild_id),
            None => self.channels.guild_of(membership.channel_id).await,
        };

        guild_id
            .map(|g| (g, membership.channel_id))
            .ok_or(MusicError::GuildNotFound)
    }

    /// Resolves `query` and queues the result in the caller's guild.
    pub async fn play(
        &self,
        origin: &CommandOrigin,
        query: &str,
    ) -> Result<Vec<Track>, MusicError> {
        let (guild_id, voice_channel) = self.locate(origin.user_id).await?;

        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::NoQuery);
        }

        let tracks = self
            .resolver
            .resolve(query, origin.user_id)
            .await
            .ok_or(MusicError::NoResults)?;

        self.enqueue(guild_id, voice_channel, tracks.clone(), origin.announce_target())
            .await?;
        Ok(tracks)
    }

    /// Queues tracks for a guild, creating its session and player first if
    /// needed. Starts playback when the queue was empty.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        tracks: Vec<Track>,
        announce: AnnounceTarget,
    ) -> Result<(), MusicError> {
        if tracks.is_empty() {
            return Err(MusicError::NoResults);
        }

        let slot = self.registry.slot(guild_id);
        let mut guard = slot.lock().await;

        let existing = guard.as_ref().map(|s| s.player.clone());
        match existing {
            Some(player) => {
                if !player.is_playing() {
                    if let Err(e) = player.connect(voice_channel).await {
                        warn!("[{}] Reconnect to {} failed: {}", guild_id, voice_channel, e);
                    }
                }
            }
            None => {
                let player = match self.engine.create_player(guild_id).await {
                    Ok(p) => p,
                    Err(e) => {
                        error!("[{}] Failed to create player: {}", guild_id, e);
                        drop(guard);
                        drop(slot);
                        self.registry.release(guild_id);
                        return Err(MusicError::EngineUnavailable);
                    }
                };
                if let Err(e) = player.connect(voice_channel).await {
                    error!("[{}] Failed to join {}: {}", guild_id, voice_channel, e);
                    if let Err(e) = player.destroy().await {
                        debug!("[{}] Destroy after failed join: {}", guild_id, e);
                    }
                    drop(guard);
                    drop(slot);
                    self.registry.release(guild_id);
                    return Err(MusicError::EngineUnavailable);
                }

                info!("[{}] New playback session in {}", guild_id, voice_channel);
                *guard = Some(GuildPlaybackSession::new(
                    self.registry.next_generation(),
                    guild_id,
                    player,
                    announce,
                ));
            }
        }

        let Some(session) = guard.as_mut() else {
            return Err(MusicError::EngineUnavailable);
        };

        let count = tracks.len();
        let was_empty = session.enqueue(tracks);
        debug!(
            "[{}] Queued {} track(s), {} total",
            guild_id,
            count,
            session.queue.len()
        );

        if was_empty && !session.playback_running {
            session.playback_running = true;
            tokio::spawn(playback_loop(PlaybackLoop {
                registry: self.registry.clone(),
                announcer: self.announcer.clone(),
                guild_id,
                generation: session.generation,
            }));
        }

        Ok(())
    }

    /// Stops the current track; the playback loop advances on its end.
    pub async fn skip(&self, user_id: UserId) -> Result<Track, MusicError> {
        let (guild_id, _) = self.locate(user_id).await?;
        let slot = self
            .registry
            .existing(guild_id)
            .ok_or(MusicError::NothingPlaying)?;
        let mut guard = slot.lock().await;
        let session = active(&mut guard)?;

        let skipped = session.head().cloned().ok_or(MusicError::NothingPlaying)?;
        if let Err(e) = session.player.stop().await {
            warn!("[{}] Skip failed: {}", guild_id, e);
        }
        Ok(skipped)
    }

    /// Leaves voice and drops the guild's session.
    pub async fn clear(&self, user_id: UserId) -> Result<(), MusicError> {
        let (guild_id, _) = self.locate(user_id).await?;
        let slot = self
            .registry
            .existing(guild_id)
            .ok_or(MusicError::NothingPlaying)?;
        let mut guard = slot.lock().await;
        active(&mut guard)?;

        if let Some(session) = guard.take() {
            teardown(guild_id, session.player.as_ref(), true).await;
        }
        drop(guard);
        drop(slot);
        self.registry.release(guild_id);
        info!("[{}] Queue cleared", guild_id);
        Ok(())
    }

    /// Shuffles the whole queue and restarts from the new head.
    pub async fn shuffle(&self, user_id: UserId) -> Result<(), MusicError> {
        let (guild_id, _) = self.locate(user_id).await?;
        let slot = self
            .registry
            .existing(guild_id)
            .ok_or(MusicError::NothingPlaying)?;
        let mut guard = slot.lock().await;
        let session = active(&mut guard)?;

        session.shuffle(&mut rand::thread_rng());
        session.restart_pending = true;
        if let Err(e) = session.player.stop().await {
            session.restart_pending = false;
            warn!("[{}] Restart after shuffle failed: {}", guild_id, e);
        }
        Ok(())
    }

    /// Flips the loop flag, returning the new value.
    pub async fn toggle_loop(&self, user_id: UserId) -> Result<bool, MusicError> {
        let (guild_id, _) = self.locate(user_id).await?;
        let slot = self
            .registry
            .existing(guild_id)
            .ok_or(MusicError::NothingPlaying)?;
        let mut guard = slot.lock().await;
        let session = active(&mut guard)?;

        session.loop_enabled = !session.loop_enabled;
        Ok(session.loop_enabled)
    }

    /// Up to [`QUEUE_LISTING_LIMIT`] queued tracks, the playing one first.
    pub async fn queue(&self, user_id: UserId) -> Result<Vec<Track>, MusicError> {
        let (guild_id, _) = self.locate(user_id).await?;
        let slot = self
            .registry
            .existing(guild_id)
            .ok_or(MusicError::NothingPlaying)?;
        let mut guard = slot.lock().await;
        let session = active(&mut guard)?;

        Ok(session
            .queue
            .iter()
            .take(QUEUE_LISTING_LIMIT)
            .cloned()
            .collect())
    }
}
