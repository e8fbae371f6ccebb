use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{common::ConfigError, configs::*};

pub const TOKEN_ENV: &str = "BOT_TOKEN";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub spotify: Option<SpotifyConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = if Path::new("config.toml").exists() {
            "config.toml"
        } else if Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err(ConfigError::NotFound);
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_string(),
            source,
        })?;
        if config_str.trim().is_empty() {
            return Err(ConfigError::Empty(config_path.to_string()));
        }

        Self::from_toml(&config_str, std::env::var(TOKEN_ENV).ok())
    }

    /// Parses and validates a config document. A non-empty `token_override`
    /// replaces `bot.token`.
    pub fn from_toml(source: &str, token_override: Option<String>) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(source)?;

        if let Some(token) = token_override.filter(|t| !t.trim().is_empty()) {
            config.bot.token = token;
        }
        if config.bot.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        config.bot.intents()?;

        Ok(config)
    }
}
