pub mod constants;
pub mod intents;
pub mod opcodes;
pub mod payload;
pub mod session;

pub use intents::Intents;
pub use opcodes::Opcode;
pub use payload::*;
pub use session::{
    ConnectReason, DispatchHandler, GatewayOptions, GatewaySession, Phase, SessionOutcome,
};

/// Anything that can ask the platform to move the bot's voice connection.
pub trait VoiceStateSender: Send + Sync {
    /// Returns `false` when the request could not be queued.
    fn update_voice_state(&self, update: UpdateVoiceState) -> bool;
}
