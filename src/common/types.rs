use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::{Mutex, RwLock};

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<Mutex<T>>;

/// A thread-safe, read-write shared component.
pub type SharedRw<T> = Arc<RwLock<T>>;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Defines a snowflake newtype.
///
/// The platform sends snowflakes as JSON strings, but a few payloads (and the
/// audio engine) use plain numbers, so both are accepted on the way in. On the
/// way out they are always strings.
macro_rules! snowflake {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(pub u64);

            impl From<u64> for $name {
                fn from(v: u64) -> Self {
                    Self(v)
                }
            }

            impl std::str::FromStr for $name {
                type Err = std::num::ParseIntError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    s.parse::<u64>().map(Self)
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Serialize for $name {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(&self.0)
                }
            }

            impl<'de> Deserialize<'de> for $name {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    match serde_json::Value::deserialize(deserializer)? {
                        serde_json::Value::String(s) => {
                            s.parse::<u64>().map(Self).map_err(serde::de::Error::custom)
                        }
                        serde_json::Value::Number(n) => n
                            .as_u64()
                            .map(Self)
                            .ok_or_else(|| serde::de::Error::custom("snowflake out of range")),
                        other => Err(serde::de::Error::custom(format!(
                            "expected snowflake, got {}",
                            other
                        ))),
                    }
                }
            }
        )*
    };
}

snowflake! {
    /// A guild (server) identifier.
    GuildId,
    /// A text or voice channel identifier.
    ChannelId,
    /// A user identifier.
    UserId,
    /// A message identifier.
    MessageId,
}

/// Milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
