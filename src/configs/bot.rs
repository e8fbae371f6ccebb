use serde::{Deserialize, Serialize};

use crate::{common::ConfigError, gateway::Intents};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_intents")]
    pub intents: Vec<String>,
    /// Shown as a "Listening to" activity when set.
    #[serde(default)]
    pub status_text: Option<String>,
}

impl BotConfig {
    /// Folds the configured intent names into a bitmask.
    pub fn intents(&self) -> Result<Intents, ConfigError> {
        self.intents.iter().try_fold(Intents::empty(), |acc, name| {
            Intents::from_name(&name.trim().to_ascii_uppercase())
                .map(|flag| acc | flag)
                .ok_or_else(|| ConfigError::UnknownIntent(name.clone()))
        })
    }
}

fn default_prefix() -> String {
    "r.".to_string()
}

fn default_intents() -> Vec<String> {
    ["GUILDS", "GUILD_VOICE_STATES", "GUILD_MESSAGES", "MESSAGE_CONTENT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
