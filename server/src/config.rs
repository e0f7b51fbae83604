//! Runtime limits for the session actor.

use shared::{BAN_LIMIT, MAX_USERNAME_LENGTH, MESSAGE_RATE, STRIKE_LIMIT, WRITE_TIMEOUT};
use std::time::Duration;

/// Abuse-control and I/O limits. `Default` gives the production values.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a banned address is refused on reconnect
    pub ban_limit: Duration,
    /// Minimum spacing between two accepted messages from one session
    pub message_rate: Duration,
    /// Strikes (rate or validation violations) that trigger a ban
    pub strike_limit: u32,
    /// Longest accepted username, in characters
    pub max_username_length: usize,
    /// Upper bound for a single write to one peer
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ban_limit: BAN_LIMIT,
            message_rate: MESSAGE_RATE,
            strike_limit: STRIKE_LIMIT,
            max_username_length: MAX_USERNAME_LENGTH,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}
