use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    /// REST base used for `GET /gateway/bot` and the other helpers.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Used when the gateway URL cannot be fetched.
    #[serde(default = "default_url")]
    pub default_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            default_url: default_url(),
        }
    }
}

fn default_api_base() -> String {
    crate::gateway::constants::DEFAULT_API_BASE.to_string()
}

fn default_url() -> String {
    crate::gateway::constants::DEFAULT_GATEWAY_URL.to_string()
}
