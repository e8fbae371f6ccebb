use std::collections::HashSet;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::trace;

use crate::common::types::{ChannelId, GuildId, UserId};

/// A voice state as sent in `VOICE_STATE_UPDATE` and inside `GUILD_CREATE`.
///
/// `guild_id` is absent in the `GUILD_CREATE` copy.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceState {
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    #[serde(default)]
    pub session_id: String,
}

/// Where a user currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceMembership {
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
}

/// Who is in which voice channel, fed by gateway events.
///
/// A user leaving voice (`channel_id: null`) is removed outright so that
/// channel member sets never hold ghosts.
#[derive(Default)]
pub struct VoiceStateStore {
    users: DashMap<UserId, VoiceMembership>,
    channels: DashMap<ChannelId, HashSet<UserId>>,
}

impl VoiceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from a guild's initial voice states.
    pub fn init_guild(&self, guild_id: GuildId, states: Vec<VoiceState>) {
        for mut state in states {
            state.guild_id.get_or_insert(guild_id);
            self.update(&state);
        }
    }

    /// Applies one voice state, returning the user's previous membership.
    pub fn update(&self, state: &VoiceState) -> Option<VoiceMembership> {
        let previous = match state.channel_id {
            Some(channel_id) => self.users.insert(
                state.user_id,
                VoiceMembership {
                    channel_id,
                    guild_id: state.guild_id,
                },
            ),
            None => self.users.remove(&state.user_id).map(|(_, m)| m),
        };

        if let Some(prev) = previous {
            if Some(prev.channel_id) != state.channel_id {
                self.leave_channel(prev.channel_id, state.user_id);
            }
        }
        if let Some(channel_id) = state.channel_id {
            self.channels
                .entry(channel_id)
                .or_default()
                .insert(state.user_id);
        }

        trace!(
            "Voice state for {}: {:?} -> {:?}",
            state.user_id,
            previous.map(|p| p.channel_id),
            state.channel_id
        );
        previous
    }

    fn leave_channel(&self, channel_id: ChannelId, user_id: UserId) {
        let now_empty = match self.channels.get_mut(&channel_id) {
            Some(mut members) => {
                members.remove(&user_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.channels.remove_if(&channel_id, |_, members| members.is_empty());
        }
    }

    pub fn user_channel(&self, user_id: UserId) -> Option<VoiceMembership> {
        self.users.get(&user_id).map(|m| *m)
    }

    /// Members of a voice channel, or `None` when nobody is in it.
    pub fn users_in_channel(&self, channel_id: ChannelId) -> Option<Vec<UserId>> {
        self.channels
            .get(&channel_id)
            .filter(|members| !members.is_empty())
            .map(|members| members.iter().copied().collect())
    }
}
