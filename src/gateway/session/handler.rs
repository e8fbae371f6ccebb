use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode};
use tracing::{debug, info, warn};

use super::{
    SessionInner,
    heartbeat::{heartbeat_message, spawn_heartbeat},
    types::{ConnectReason, Phase, SessionOutcome},
};
use crate::gateway::{
    GatewayPayload, Hello, Identify, IdentifyProperties, Opcode, Ready, Resume,
    constants::{CLOSE_INVALID_SESSION, CLOSE_RECONNECT, DEFAULT_HEARTBEAT_INTERVAL_MS},
    opcodes::events,
};

/// State owned by one socket attempt. Dropping it stops the heartbeat.
pub struct AttemptState {
    inner: Arc<SessionInner>,
    reason: ConnectReason,
    tx: UnboundedSender<Message>,
    zombie_tx: UnboundedSender<()>,
    acked: Arc<AtomicBool>,
    heartbeat_handle: Option<tokio::task::JoinHandle<()>>,
}

impl AttemptState {
    pub fn new(
        inner: Arc<SessionInner>,
        reason: ConnectReason,
        tx: UnboundedSender<Message>,
        zombie_tx: UnboundedSender<()>,
    ) -> Self {
        Self {
            inner,
            reason,
            tx,
            zombie_tx,
            acked: Arc::new(AtomicBool::new(true)),
            heartbeat_handle: None,
        }
    }

    pub fn handle_text(&mut self, text: &str) -> Option<SessionOutcome> {
        let payload: GatewayPayload = match serde_json::from_str(text) {
            Ok(p) => p,
            Err(e) => {
                warn!("Ignoring malformed gateway frame: {} - Text: {}", e, text);
                return None;
            }
        };

        if let Some(seq) = payload.s {
            self.inner.record_sequence(seq);
        }

        match payload.opcode() {
            Some(Opcode::Hello) => self.handle_hello(payload.d),
            Some(Opcode::Dispatch) => self.handle_dispatch(payload.t, payload.d),
            Some(Opcode::Heartbeat) => {
                debug!("Gateway requested an immediate heartbeat");
                self.send_heartbeat();
                None
            }
            Some(Opcode::HeartbeatAck) => {
                self.acked.store(true, Ordering::Release);
                None
            }
            Some(Opcode::Reconnect) => {
                info!("Gateway asked us to reconnect");
                self.close(CLOSE_RECONNECT, "Reconnect requested");
                Some(SessionOutcome::Resume)
            }
            Some(Opcode::InvalidSession) => {
                let can_resume = payload.d.as_bool().unwrap_or(false);
                warn!("Gateway session invalidated (resumable: {})", can_resume);
                if !can_resume {
                    self.inner.forget_session();
                }
                self.close(CLOSE_INVALID_SESSION, "Invalid session");
                Some(SessionOutcome::InvalidSession { can_resume })
            }
            _ => {
                debug!("Ignoring gateway op {}", payload.op);
                None
            }
        }
    }

    fn handle_hello(&mut self, d: Value) -> Option<SessionOutcome> {
        let interval = serde_json::from_value::<Hello>(d)
            .map(|h| h.heartbeat_interval)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS);

        if let Some(h) = self.heartbeat_handle.take() {
            h.abort();
        }
        self.acked.store(true, Ordering::Release);
        self.inner.set_heartbeat_interval(interval);

        match self.reason {
            ConnectReason::Identify => {
                let identify = Identify {
                    token: self.inner.token.clone(),
                    intents: self.inner.intents,
                    properties: IdentifyProperties::default(),
                    presence: self.inner.presence.clone(),
                };
                self.inner.set_phase(Phase::Identifying);
                self.send(Opcode::Identify, serde_json::to_value(identify).ok()?);
            }
            ConnectReason::Resume => {
                let Some(session_id) = self.inner.session_id() else {
                    // The outer loop downgrades before connecting; this only
                    // happens if the session was forgotten mid-attempt.
                    warn!("Cannot resume without a session id");
                    return Some(SessionOutcome::Identify);
                };
                let resume = Resume {
                    token: self.inner.token.clone(),
                    session_id,
                    seq: self.inner.sequence(),
                };
                self.inner.set_phase(Phase::Resuming);
                self.send(Opcode::Resume, serde_json::to_value(resume).ok()?);
            }
        }

        // The handshake goes out before the first beat can.
        let jitter = rand::thread_rng().gen_range(0..interval.max(1));
        debug!(
            "Heartbeat interval set to {}ms, first beat in {}ms",
            interval, jitter
        );
        self.heartbeat_handle = Some(spawn_heartbeat(
            self.tx.clone(),
            self.inner.seq.clone(),
            self.acked.clone(),
            self.zombie_tx.clone(),
            interval,
            jitter,
        ));
        None
    }

    fn handle_dispatch(&mut self, event: Option<String>, d: Value) -> Option<SessionOutcome> {
        let Some(event) = event else {
            warn!("Dispatch without an event name");
            return None;
        };

        match event.as_str() {
            events::READY => match serde_json::from_value::<Ready>(d.clone()) {
                Ok(ready) => {
                    info!(
                        "Gateway ready as {} ({})",
                        ready.user.username, ready.user.id
                    );
                    self.inner.complete_handshake(ready.session_id, ready.user.id);
                }
                Err(e) => warn!("Malformed READY payload: {}", e),
            },
            events::RESUMED => {
                info!("Gateway session resumed");
                self.inner.mark_established();
            }
            _ => {}
        }

        self.inner.dispatch(&event, d);
        None
    }

    fn send_heartbeat(&self) {
        if let Some(msg) = heartbeat_message(self.inner.seq.load(Ordering::Acquire)) {
            let _ = self.tx.send(msg);
        }
    }

    fn send(&self, op: Opcode, d: Value) {
        match serde_json::to_string(&GatewayPayload::new(op, d)) {
            Ok(json) => {
                let _ = self.tx.send(Message::Text(json.into()));
            }
            Err(e) => warn!("Failed to encode op {:?}: {}", op, e),
        }
    }

    /// Queues a close frame. The caller decides the outcome; the server's
    /// reply to this close is not classified.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        })));
    }
}

impl Drop for AttemptState {
    fn drop(&mut self) {
        if let Some(h) = self.heartbeat_handle.take() {
            h.abort();
        }
    }
}
