use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::GuildPlaybackSession;
use crate::common::types::GuildId;

/// A guild's playback state behind its own lock.
pub type SessionSlot = Arc<Mutex<Option<GuildPlaybackSession>>>;

/// Guild id to playback session. Same-guild callers serialize on the
/// guild's slot; different guilds never contend.
#[derive(Default)]
pub struct GuildSessionRegistry {
    slots: DashMap<GuildId, SessionSlot>,
    generation: AtomicU64,
}

impl GuildSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The guild's slot, created on first use.
    pub fn slot(&self, guild_id: GuildId) -> SessionSlot {
        self.slots.entry(guild_id).or_default().clone()
    }

    /// The guild's slot, without creating one.
    pub fn existing(&self, guild_id: GuildId) -> Option<SessionSlot> {
        self.slots.get(&guild_id).map(|s| s.clone())
    }

    /// Snapshot of the guild's session.
    pub async fn get(&self, guild_id: GuildId) -> Option<GuildPlaybackSession> {
        let slot = self.existing(guild_id)?;
        let guard = slot.lock().await;
        guard.clone()
    }

    pub async fn set(&self, guild_id: GuildId, session: Option<GuildPlaybackSession>) {
        let slot = self.slot(guild_id);
        *slot.lock().await = session;
        drop(slot);
        self.release(guild_id);
    }

    pub async fn contains(&self, guild_id: GuildId) -> bool {
        match self.existing(guild_id) {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    pub async fn active_guilds(&self) -> Vec<GuildId> {
        let slots: Vec<(GuildId, SessionSlot)> = self
            .slots
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut active = Vec::new();
        for (guild_id, slot) in slots {
            if slot.lock().await.is_some() {
                active.push(guild_id);
            }
        }
        active
    }

    /// Drops the guild's slot if it is empty and nobody else holds it.
    pub fn release(&self, guild_id: GuildId) {
        self.slots.remove_if(&guild_id, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.is_none())
        });
    }

    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}
