use std::time::Duration;

use rand::Rng;

use crate::gateway::constants::{RECONNECT_JITTER_MAX_MS, RECONNECT_JITTER_MIN_MS};

/// Random wait in `[2.5s, 5s)` used after an invalid session or a failed open.
pub fn reconnect_jitter() -> Duration {
    let ms = rand::thread_rng().gen_range(RECONNECT_JITTER_MIN_MS..RECONNECT_JITTER_MAX_MS);
    Duration::from_millis(ms)
}

/// Capped exponential backoff: `base * 2^(attempt-1)`, at most `base * 2^max_shift`.
pub struct Backoff {
    attempt: u32,
    base_ms: u64,
    max_shift: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_shift: u32) -> Self {
        Self {
            attempt: 0,
            base_ms,
            max_shift,
        }
    }

    pub fn next(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.base_ms * 2u64.pow((self.attempt - 1).min(self.max_shift));
        Duration::from_millis(delay)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
