//! Process wiring: gateway events in, voice plumbing and commands out.

use std::sync::Arc;

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};

pub mod announce;
pub mod commands;

pub use announce::RestAnnouncer;
pub use commands::Command;

use self::announce::{COLOR_NEUTRAL, added_embed, describe_track, error_embed, queue_embed};
use crate::{
    common::types::GuildId,
    engine::LavalinkNode,
    gateway::{GatewaySession, Ready, opcodes::events},
    player::{CommandOrigin, PlaybackOrchestrator},
    rest::{Embed, Message},
    voice::{VoiceState, VoiceStateStore},
};

#[derive(Debug, Deserialize)]
struct GuildCreate {
    id: GuildId,
    #[serde(default)]
    voice_states: Vec<VoiceState>,
}

#[derive(Debug, Deserialize)]
struct VoiceServerUpdate {
    guild_id: GuildId,
}

fn decode<T: DeserializeOwned>(event: &str, d: Value) -> Option<T> {
    match serde_json::from_value(d) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", event, e);
            None
        }
    }
}

/// Everything the gateway handlers need.
pub struct Bot {
    prefix: String,
    voice: Arc<VoiceStateStore>,
    node: LavalinkNode,
    orchestrator: Arc<PlaybackOrchestrator>,
    announcer: RestAnnouncer,
}

impl Bot {
    pub fn new(
        prefix: String,
        voice: Arc<VoiceStateStore>,
        node: LavalinkNode,
        orchestrator: Arc<PlaybackOrchestrator>,
        announcer: RestAnnouncer,
    ) -> Self {
        Self {
            prefix,
            voice,
            node,
            orchestrator,
            announcer,
        }
    }

    /// Installs the dispatch handlers on `gateway`.
    pub fn register(self: &Arc<Self>, gateway: &GatewaySession) {
        let bot = self.clone();
        gateway.on(events::READY, move |d| {
            let bot = bot.clone();
            async move { bot.on_ready(d) }
        });

        let bot = self.clone();
        gateway.on(events::GUILD_CREATE, move |d| {
            let bot = bot.clone();
            async move { bot.on_guild_create(d) }
        });

        let bot = self.clone();
        gateway.on(events::VOICE_STATE_UPDATE, move |d| {
            let bot = bot.clone();
            async move { bot.on_voice_state(d) }
        });

        let bot = self.clone();
        gateway.on(events::VOICE_SERVER_UPDATE, move |d| {
            let bot = bot.clone();
            async move { bot.on_voice_server(d) }
        });

        let bot = self.clone();
        gateway.on(events::MESSAGE_CREATE, move |d| {
            let bot = bot.clone();
            async move { bot.on_message(d) }
        });
    }

    fn on_ready(&self, d: Value) {
        let Some(ready) = decode::<Ready>(events::READY, d) else {
            return;
        };
        info!("Logged in as {} ({})", ready.user.username, ready.user.id);
        self.node.start(ready.user.id);
    }

    fn on_guild_create(&self, d: Value) {
        let Some(guild) = decode::<GuildCreate>(events::GUILD_CREATE, d) else {
            return;
        };
        debug!(
            "[{}] Seeding {} voice states",
            guild.id,
            guild.voice_states.len()
        );
        self.voice.init_guild(guild.id, guild.voice_states);
    }

    fn on_voice_state(&self, d: Value) {
        let Some(state) = decode::<VoiceState>(events::VOICE_STATE_UPDATE, d) else {
            return;
        };
        self.voice.update(&state);
        self.node.handle_voice_state(&state);
    }

    fn on_voice_server(&self, d: Value) {
        let Some(update) = decode::<VoiceServerUpdate>(events::VOICE_SERVER_UPDATE, d.clone())
        else {
            return;
        };
        self.node.handle_voice_server(update.guild_id, d);
    }

    /// Command work runs on its own task, off the dispatch queue.
    fn on_message(self: &Arc<Self>, d: Value) {
        let Some(message) = decode::<Message>(events::MESSAGE_CREATE, d) else {
            return;
        };
        if message.author.as_ref().is_none_or(|a| a.bot) {
            return;
        }
        let bot = self.clone();
        tokio::spawn(async move { bot.run_command(message).await });
    }

    async fn run_command(&self, message: Message) {
        let Some(author) = message.author.as_ref() else {
            return;
        };
        let Some(command) = Command::parse(&self.prefix, &message.content) else {
            return;
        };

        let origin = CommandOrigin {
            user_id: author.id,
            channel_id: message.channel_id,
            message_id: Some(message.id),
        };
        debug!("{} ran {}", origin.user_id, command.name());

        let reply = self.execute(command, &origin).await;
        self.announcer.send(&origin.announce_target(), reply).await;
    }

    /// Runs one command and builds the reply.
    pub async fn execute(&self, command: Command<'_>, origin: &CommandOrigin) -> Embed {
        let orchestrator = &self.orchestrator;
        let result = match command {
            Command::Play(query) => orchestrator
                .play(origin, query)
                .await
                .map(|tracks| added_embed(&tracks)),
            Command::Skip => orchestrator.skip(origin.user_id).await.map(|track| {
                Embed::described(
                    COLOR_NEUTRAL,
                    format!(":fast_forward: Skipped {}", describe_track(&track)),
                )
            }),
            Command::Clear => orchestrator
                .clear(origin.user_id)
                .await
                .map(|_| Embed::described(COLOR_NEUTRAL, ":fast_forward: Cleared the queue")),
            Command::Shuffle => orchestrator.shuffle(origin.user_id).await.map(|_| {
                Embed::described(
                    COLOR_NEUTRAL,
                    ":twisted_rightwards_arrows: Shuffled the playlist!",
                )
            }),
            Command::Loop => orchestrator.toggle_loop(origin.user_id).await.map(|on| {
                let text = if on {
                    ":repeat: Looping the current queue"
                } else {
                    ":arrow_right: Stopped looping the current queue"
                };
                Embed::described(COLOR_NEUTRAL, text)
            }),
            Command::Queue => orchestrator
                .queue(origin.user_id)
                .await
                .map(|tracks| queue_embed(&tracks)),
        };

        result.unwrap_or_else(|e| {
            debug!("{} failed for {}: {}", command.name(), origin.user_id, e);
            error_embed(&e)
        })
    }
}
