/// Which handshake the next attempt sends after Hello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReason {
    Identify,
    Resume,
}

/// Connection phase of the gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingHello,
    Identifying,
    Resuming,
    Connected,
}

/// Outcome of a single WS attempt. Tells the outer loop what to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Reconnect now and send Resume.
    Resume,
    /// Reconnect now and send a fresh Identify.
    Identify,
    /// Op 9. Wait the jitter window, then resume if allowed.
    InvalidSession { can_resume: bool },
    /// The socket never opened. Wait the jitter window, then resume.
    Unreachable,
    /// Close code outside the recoverable classes. Stop.
    Terminal { code: u16, reason: String },
    /// Local shutdown requested.
    Shutdown,
}

/// Classifies a server close by code class (`code / 1000`).
///
/// - class 1 (`1000`-`1999`): transport level close, start a new session.
/// - class 4 (`4000`-`4999`): gateway close, try to resume.
/// - anything else is terminal.
pub fn classify_close(code: u16, reason: &str) -> SessionOutcome {
    match code / 1000 {
        1 => SessionOutcome::Identify,
        4 => SessionOutcome::Resume,
        _ => SessionOutcome::Terminal {
            code,
            reason: reason.to_string(),
        },
    }
}
