/// REST base for the platform API.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Gateway host used when `GET /gateway/bot` fails.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Appended to every gateway URL.
pub const GATEWAY_QUERY: &str = "/?v=10&encoding=json";

/// Lower bound (ms) of the wait after an invalid session or a failed open.
pub const RECONNECT_JITTER_MIN_MS: u64 = 2_500;

/// Upper bound (ms, exclusive) of the same window.
pub const RECONNECT_JITTER_MAX_MS: u64 = 5_000;

/// Close code used when a heartbeat went unacknowledged.
pub const CLOSE_ZOMBIE: u16 = 3000;

/// Close code used when the server asked us to reconnect.
pub const CLOSE_RECONNECT: u16 = 3001;

/// Close code used after an invalid session.
pub const CLOSE_INVALID_SESSION: u16 = 3002;

/// Normal closure, used on shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Fallback when Hello carries no interval.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41_250;

/// Timeout (ms) allowed for the WS write task to flush and exit.
pub const WRITE_TASK_SHUTDOWN_MS: u64 = 500;
