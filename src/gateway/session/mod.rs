use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt, future::BoxFuture};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    common::{errors::GatewayError, types::UserId},
    gateway::{
        GatewayPayload, Intents, Opcode, Presence, UpdateVoiceState, VoiceStateSender,
        constants::{CLOSE_NORMAL, CLOSE_ZOMBIE, GATEWAY_QUERY, WRITE_TASK_SHUTDOWN_MS},
    },
    rest::RestClient,
};

pub mod backoff;
pub mod handler;
pub mod heartbeat;
pub mod types;

pub use self::types::{ConnectReason, Phase, SessionOutcome, classify_close};
use self::{backoff::reconnect_jitter, handler::AttemptState};

/// Handler invoked with the `d` field of a dispatch.
pub type DispatchHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

type HandlerMap = Arc<RwLock<HashMap<String, DispatchHandler>>>;

pub struct GatewayOptions {
    pub token: String,
    pub intents: Intents,
    pub presence: Option<Presence>,
    /// Used for `GET /gateway/bot`.
    pub rest: RestClient,
    /// Used when the lookup fails.
    pub default_url: String,
}

/// Session-wide state shared by the outer loop, the per-attempt handler and
/// the public handle.
pub(crate) struct SessionInner {
    token: String,
    intents: Intents,
    presence: Option<Presence>,
    rest: RestClient,
    default_url: String,
    phase: Mutex<Phase>,
    session_id: Mutex<Option<String>>,
    user_id: Mutex<Option<UserId>>,
    /// Last seen sequence, `-1` when none.
    seq: Arc<AtomicI64>,
    heartbeat_interval: AtomicU64,
    /// Set once the current attempt finished its handshake.
    established: AtomicBool,
    handlers: HandlerMap,
    /// Dispatches in arrival order, drained by a single task.
    dispatch_tx: UnboundedSender<(String, Value)>,
    /// Taken by the first dispatch, which starts the draining task.
    dispatch_rx: Mutex<Option<UnboundedReceiver<(String, Value)>>>,
    outbound: Mutex<Option<UnboundedSender<Message>>>,
    cancel: CancellationToken,
}

impl SessionInner {
    fn set_phase(&self, phase: Phase) {
        *self.phase.lock() = phase;
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn sequence(&self) -> Option<u64> {
        let seq = self.seq.load(Ordering::Acquire);
        (seq >= 0).then_some(seq as u64)
    }

    /// Sequence numbers only move forward.
    fn record_sequence(&self, seq: u64) {
        self.seq.fetch_max(seq as i64, Ordering::AcqRel);
    }

    fn set_heartbeat_interval(&self, ms: u64) {
        self.heartbeat_interval.store(ms, Ordering::Release);
    }

    #[cfg(test)]
    fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval.load(Ordering::Acquire)
    }

    fn complete_handshake(&self, session_id: String, user_id: UserId) {
        *self.session_id.lock() = Some(session_id);
        *self.user_id.lock() = Some(user_id);
        self.mark_established();
    }

    fn mark_established(&self) {
        self.established.store(true, Ordering::Release);
        self.set_phase(Phase::Connected);
    }

    fn forget_session(&self) {
        *self.session_id.lock() = None;
        self.seq.store(-1, Ordering::Release);
    }

    /// Queues a dispatch. Handlers run one at a time in sequence order, off
    /// the read loop.
    fn dispatch(&self, event: &str, d: Value) {
        if let Some(rx) = self.dispatch_rx.lock().take() {
            tokio::spawn(drain_dispatches(self.handlers.clone(), rx));
        }
        if self.dispatch_tx.send((event.to_string(), d)).is_err() {
            warn!("Dispatch queue closed; dropping {}", event);
        }
    }
}

/// Ends once the session (and with it the sender) is dropped.
async fn drain_dispatches(handlers: HandlerMap, mut rx: UnboundedReceiver<(String, Value)>) {
    while let Some((event, d)) = rx.recv().await {
        let handler = handlers.read().get(&event).cloned();
        match handler {
            Some(handler) => handler(d).await,
            None => debug!("No handler for dispatch {}", event),
        }
    }
}

/// The control-plane connection. Cheap to clone; all clones drive and observe
/// the same session.
#[derive(Clone)]
pub struct GatewaySession {
    inner: Arc<SessionInner>,
}

impl GatewaySession {
    pub fn new(options: GatewayOptions) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SessionInner {
                token: options.token,
                intents: options.intents,
                presence: options.presence,
                rest: options.rest,
                default_url: options.default_url,
                phase: Mutex::new(Phase::Idle),
                session_id: Mutex::new(None),
                user_id: Mutex::new(None),
                seq: Arc::new(AtomicI64::new(-1)),
                heartbeat_interval: AtomicU64::new(0),
                established: AtomicBool::new(false),
                handlers: Arc::new(RwLock::new(HashMap::new())),
                dispatch_tx,
                dispatch_rx: Mutex::new(Some(dispatch_rx)),
                outbound: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Registers the handler for `event`, replacing any earlier one.
    pub fn on<F, Fut>(&self, event: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: DispatchHandler = Arc::new(move |d| Box::pin(handler(d)));
        if self
            .inner
            .handlers
            .write()
            .insert(event.to_string(), handler)
            .is_some()
        {
            debug!("Replaced handler for {}", event);
        }
    }

    /// Queues a payload on the live socket. Returns `false` (and logs) when no
    /// socket is open.
    pub fn send(&self, op: Opcode, d: Value) -> bool {
        let outbound = self.inner.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            warn!("Dropping op {:?}: gateway socket is not open", op);
            return false;
        };
        match serde_json::to_string(&GatewayPayload::new(op, d)) {
            Ok(json) => tx.send(Message::Text(json.into())).is_ok(),
            Err(e) => {
                warn!("Failed to encode op {:?}: {}", op, e);
                false
            }
        }
    }

    /// Starts the session on a background task.
    pub fn connect(
        &self,
        reason: ConnectReason,
    ) -> tokio::task::JoinHandle<Result<(), GatewayError>> {
        let this = self.clone();
        tokio::spawn(async move { this.run(reason).await })
    }

    /// Stops the run loop and closes the socket with a normal close.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.session_id()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.inner.sequence()
    }

    pub fn user_id(&self) -> Option<UserId> {
        *self.inner.user_id.lock()
    }

    /// Connects and keeps reconnecting until shutdown or a terminal close.
    pub async fn run(&self, mut reason: ConnectReason) -> Result<(), GatewayError> {
        loop {
            if self.inner.cancel.is_cancelled() {
                return Ok(());
            }

            if reason == ConnectReason::Resume && self.inner.session_id().is_none() {
                warn!("No session to resume; identifying instead");
                reason = ConnectReason::Identify;
            }
            if reason == ConnectReason::Identify {
                self.inner.forget_session();
            }

            self.inner.established.store(false, Ordering::Release);
            let outcome = match self.attempt(reason).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{}", e);
                    SessionOutcome::Unreachable
                }
            };

            match outcome {
                SessionOutcome::Shutdown => {
                    info!("Gateway shutting down");
                    return Ok(());
                }
                next @ (SessionOutcome::Resume | SessionOutcome::Identify) => {
                    // A close during the handshake (bad token, resume refused)
                    // would otherwise loop without any delay.
                    if !self.inner.established.load(Ordering::Acquire) {
                        let delay = reconnect_jitter();
                        debug!("Handshake did not complete; retrying in {:?}", delay);
                        if !self.sleep(delay).await {
                            return Ok(());
                        }
                    }
                    reason = if next == SessionOutcome::Resume {
                        ConnectReason::Resume
                    } else {
                        ConnectReason::Identify
                    };
                }
                SessionOutcome::InvalidSession { can_resume } => {
                    let delay = reconnect_jitter();
                    debug!("Reconnecting in {:?} after invalid session", delay);
                    if !self.sleep(delay).await {
                        return Ok(());
                    }
                    reason = if can_resume {
                        ConnectReason::Resume
                    } else {
                        ConnectReason::Identify
                    };
                }
                SessionOutcome::Unreachable => {
                    let delay = reconnect_jitter();
                    debug!("Gateway unreachable; retrying in {:?}", delay);
                    if !self.sleep(delay).await {
                        return Ok(());
                    }
                    reason = ConnectReason::Resume;
                }
                SessionOutcome::Terminal { code, reason } => {
                    error!(
                        "Gateway closed with code {} ('{}'); not reconnecting",
                        code, reason
                    );
                    return Err(GatewayError::Terminal { code, reason });
                }
            }
        }
    }

    /// Sleeps unless shut down first. Returns `false` on shutdown.
    async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.inner.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn gateway_url(&self) -> String {
        let base = match self.inner.rest.get_gateway_bot().await {
            Some(bot) => bot.url,
            None => {
                warn!(
                    "Gateway lookup failed; using default {}",
                    self.inner.default_url
                );
                self.inner.default_url.clone()
            }
        };
        format!("{}{}", base.trim_end_matches('/'), GATEWAY_QUERY)
    }

    async fn attempt(&self, reason: ConnectReason) -> Result<SessionOutcome, GatewayError> {
        let url = self.gateway_url().await;
        debug!("Connecting to gateway: {} ({:?})", url, reason);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|source| GatewayError::Connect { url, source })?;
        let (mut write, mut read) = ws_stream.split();
        self.inner.set_phase(Phase::AwaitingHello);

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let (zombie_tx, mut zombie_rx) = mpsc::unbounded_channel::<()>();
        *self.inner.outbound.lock() = Some(tx.clone());

        // Drains until every sender is gone so a queued close frame still
        // goes out after the read loop has finished.
        let mut write_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    warn!("Gateway write error: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let mut state = AttemptState::new(self.inner.clone(), reason, tx.clone(), zombie_tx);

        let outcome = loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => {
                    state.close(CLOSE_NORMAL, "Shutting down");
                    break SessionOutcome::Shutdown;
                }
                Some(()) = zombie_rx.recv() => {
                    state.close(CLOSE_ZOMBIE, "Heartbeat not acknowledged");
                    break SessionOutcome::Resume;
                }
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("Gateway read error: {}", e);
                            break SessionOutcome::Resume;
                        }
                        None => {
                            debug!("Gateway stream ended");
                            break SessionOutcome::Resume;
                        }
                    };

                    match msg {
                        Message::Text(text) => {
                            if let Some(outcome) = state.handle_text(text.as_str()) {
                                break outcome;
                            }
                        }
                        Message::Close(frame) => {
                            let (code, reason) = frame
                                .map(|cf| (cf.code.into(), cf.reason.to_string()))
                                .unwrap_or((CLOSE_NORMAL, "No reason".into()));
                            info!("Gateway closed: code={}, reason='{}'", code, reason);
                            break classify_close(code, &reason);
                        }
                        _ => {}
                    }
                }
            }
        };

        *self.inner.outbound.lock() = None;
        drop(state);
        drop(tx);
        if tokio::time::timeout(
            Duration::from_millis(WRITE_TASK_SHUTDOWN_MS),
            &mut write_task,
        )
        .await
        .is_err()
        {
            write_task.abort();
        }
        self.inner.set_phase(Phase::Idle);

        Ok(outcome)
    }
}

impl VoiceStateSender for GatewaySession {
    fn update_voice_state(&self, update: UpdateVoiceState) -> bool {
        match serde_json::to_value(&update) {
            Ok(d) => self.send(Opcode::VoiceStateUpdate, d),
            Err(e) => {
                warn!("[{}] Failed to encode voice state: {}", update.guild_id, e);
                false
            }
        }
    }
}
