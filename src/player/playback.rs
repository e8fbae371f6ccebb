use std::{collections::HashSet, sync::Arc};

use tracing::{debug, error, info, warn};

use super::{Announcer, GuildSessionRegistry};
use crate::{
    common::types::GuildId,
    engine::{EnginePlayer, PlayerEvent},
};

/// Events already handled for the current play attempt.
#[derive(Default)]
pub(crate) struct FiredEvents(HashSet<&'static str>);

impl FiredEvents {
    /// `true` the first time an event of this kind is seen.
    pub(crate) fn first(&mut self, event: &PlayerEvent) -> bool {
        self.0.insert(event.name())
    }
}

/// How one play attempt ended.
enum Step {
    Advance,
    Disconnected,
    Closed,
}

pub(crate) struct PlaybackLoop {
    pub registry: Arc<GuildSessionRegistry>,
    pub announcer: Arc<dyn Announcer>,
    pub guild_id: GuildId,
    pub generation: u64,
}

/// Plays the guild's queue head, waits for it to finish, and moves on until
/// the queue runs out or the session goes away.
pub(crate) async fn playback_loop(ctx: PlaybackLoop) {
    let PlaybackLoop {
        registry,
        announcer,
        guild_id,
        generation,
    } = ctx;

    let slot = registry.slot(guild_id);

    loop {
        // -- 1. Start the head -------------------------------------------
        let (mut subscription, player, track, target) = {
            let mut guard = slot.lock().await;
            let Some(session) = guard.as_mut().filter(|s| s.generation == generation) else {
                // Superseded or cleared while this loop was between tracks.
                drop(guard);
                drop(slot);
                registry.release(guild_id);
                return;
            };
            let Some(head) = session.head().cloned() else {
                // Nothing left to start; the guild goes back to idle.
                info!("[{}] Queue is empty, leaving", guild_id);
                if let Some(session) = guard.take() {
                    teardown(guild_id, session.player.as_ref(), true).await;
                }
                drop(guard);
                drop(slot);
                registry.release(guild_id);
                return;
            };

            let started = session.player.play(&head.encoded).await;
            match started {
                Ok(subscription) => (
                    subscription,
                    session.player.clone(),
                    head,
                    session.announce,
                ),
                Err(e) => {
                    error!("[{}] Failed to start '{}': {}", guild_id, head.title, e);
                    if let Some(session) = guard.take() {
                        teardown(guild_id, session.player.as_ref(), true).await;
                    }
                    drop(guard);
                    drop(slot);
                    registry.release(guild_id);
                    return;
                }
            }
        };

        info!("[{}] Playing '{}'", guild_id, track.title);

        // -- 2. Wait for this attempt to finish ----------------------------
        let mut fired = FiredEvents::default();
        let step = loop {
            let Some(event) = subscription.next().await else {
                break Step::Closed;
            };
            if !fired.first(&event) {
                debug!("[{}] Dropping repeated {} event", guild_id, event.name());
                continue;
            }

            match event {
                PlayerEvent::TrackStart => announcer.now_playing(&target, &track).await,
                PlayerEvent::TrackEnd { reason } => {
                    debug!("[{}] '{}' ended: {:?}", guild_id, track.title, reason);
                    break Step::Advance;
                }
                PlayerEvent::Disconnected => break Step::Disconnected,
                PlayerEvent::ChannelMove { channel_id } => {
                    debug!("[{}] Moved to {}", guild_id, channel_id);
                    nudge(guild_id, player.as_ref()).await;
                }
                PlayerEvent::TrackStuck { threshold_ms } => {
                    warn!(
                        "[{}] '{}' stuck for {}ms",
                        guild_id, track.title, threshold_ms
                    );
                    announcer.track_stuck(&target).await;
                    nudge(guild_id, player.as_ref()).await;
                }
                PlayerEvent::TrackException { message } => {
                    warn!("[{}] '{}' failed: {}", guild_id, track.title, message);
                }
            }
        };
        subscription.off();

        // -- 3. Apply the outcome -----------------------------------------
        let mut guard = slot.lock().await;
        let Some(session) = guard.as_mut().filter(|s| s.generation == generation) else {
            drop(guard);
            drop(slot);
            registry.release(guild_id);
            return;
        };

        match step {
            Step::Closed => {
                debug!("[{}] Event stream closed", guild_id);
                session.playback_running = false;
                return;
            }
            Step::Disconnected => {
                info!("[{}] Left voice, dropping the queue", guild_id);
                if let Some(session) = guard.take() {
                    teardown(guild_id, session.player.as_ref(), false).await;
                }
                drop(guard);
                drop(slot);
                registry.release(guild_id);
                return;
            }
            Step::Advance => {
                session.complete_head();
                if session.queue.is_empty() {
                    info!("[{}] Queue finished", guild_id);
                    let target = session.announce;
                    if let Some(session) = guard.take() {
                        teardown(guild_id, session.player.as_ref(), true).await;
                    }
                    drop(guard);
                    drop(slot);
                    registry.release(guild_id);
                    announcer.finished(&target).await;
                    return;
                }
            }
        }
    }
}

/// Pause then resume, which is enough to recover a moved or stuck player.
async fn nudge(guild_id: GuildId, player: &dyn EnginePlayer) {
    if let Err(e) = player.pause().await {
        warn!("[{}] Pause failed: {}", guild_id, e);
    }
    if let Err(e) = player.resume().await {
        warn!("[{}] Resume failed: {}", guild_id, e);
    }
}

/// Releases a player whose session is being dropped. `leave` also asks the
/// gateway to move the bot out of voice.
pub(crate) async fn teardown(guild_id: GuildId, player: &dyn EnginePlayer, leave: bool) {
    if leave {
        if let Err(e) = player.disconnect().await {
            warn!("[{}] Voice disconnect failed: {}", guild_id, e);
        }
    }
    if let Err(e) = player.stop().await {
        debug!("[{}] Stop on teardown failed: {}", guild_id, e);
    }
    if let Err(e) = player.destroy().await {
        warn!("[{}] Destroy failed: {}", guild_id, e);
    }
}
