use async_trait::async_trait;
use tracing::debug;

use super::{EnginePlayer, LavalinkNode, TrackSubscription, protocol::OutgoingOp};
use crate::{
    common::{
        errors::EngineError,
        types::{ChannelId, GuildId},
    },
    gateway::UpdateVoiceState,
};

pub struct LavalinkPlayer {
    guild_id: GuildId,
    node: LavalinkNode,
}

impl LavalinkPlayer {
    pub(crate) fn new(guild_id: GuildId, node: LavalinkNode) -> Self {
        Self { guild_id, node }
    }

    fn pause_op(&self, pause: bool) -> Result<(), EngineError> {
        self.node.send_op(&OutgoingOp::Pause {
            guild_id: self.guild_id,
            pause,
        })
    }
}

#[async_trait]
impl EnginePlayer for LavalinkPlayer {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    async fn connect(&self, channel_id: ChannelId) -> Result<(), EngineError> {
        debug!("[{}] Joining voice channel {}", self.guild_id, channel_id);
        if self
            .node
            .voice()
            .update_voice_state(UpdateVoiceState::join(self.guild_id, channel_id))
        {
            Ok(())
        } else {
            Err(EngineError::VoiceUnavailable)
        }
    }

    async fn play(&self, encoded: &str) -> Result<TrackSubscription, EngineError> {
        let subscription = self.node.subscribe(self.guild_id)?;
        self.node.send_op(&OutgoingOp::Play {
            guild_id: self.guild_id,
            track: encoded.to_string(),
        })?;
        self.node.set_playing(self.guild_id, true);
        Ok(subscription)
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.pause_op(true)
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.pause_op(false)
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.node.send_op(&OutgoingOp::Stop {
            guild_id: self.guild_id,
        })
    }

    async fn destroy(&self) -> Result<(), EngineError> {
        self.node.remove_link(self.guild_id);
        debug!("[{}] Player destroyed", self.guild_id);
        self.node.send_op(&OutgoingOp::Destroy {
            guild_id: self.guild_id,
        })
    }

    async fn disconnect(&self) -> Result<(), EngineError> {
        debug!("[{}] Leaving voice", self.guild_id);
        if self
            .node
            .voice()
            .update_voice_state(UpdateVoiceState::leave(self.guild_id))
        {
            Ok(())
        } else {
            Err(EngineError::VoiceUnavailable)
        }
    }

    fn is_playing(&self) -> bool {
        self.node.is_playing(self.guild_id)
    }
}
