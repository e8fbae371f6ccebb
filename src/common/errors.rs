use thiserror::Error;

/// Failures of the control-plane connection.
///
/// Everything except [`GatewayError::Terminal`] is recovered by the reconnect
/// loop; these variants only surface in logs.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to open gateway socket at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("gateway socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode gateway payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// A close code outside the identify/resume classes. Needs an operator.
    #[error("gateway closed with unrecoverable code {code}: {reason}")]
    Terminal { code: u16, reason: String },
}

/// Failures talking to the audio engine node.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("audio engine returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("audio engine socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("audio engine payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("audio engine node is not connected")]
    NotConnected,
    #[error("gateway socket is not open; cannot change voice channel")]
    VoiceUnavailable,
    #[error("no player exists for guild {0}")]
    PlayerGone(crate::common::types::GuildId),
}

/// Failures loading `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config.toml or config.default.toml not found")]
    NotFound,
    #[error("{0} is empty")]
    Empty(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no bot token configured (set bot.token or BOT_TOKEN)")]
    MissingToken,
    #[error("unknown gateway intent '{0}'")]
    UnknownIntent(String),
}
