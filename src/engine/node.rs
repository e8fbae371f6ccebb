use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::{self, HeaderValue},
    protocol::Message,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{
    AudioEngine, EnginePlayer, LavalinkPlayer, LavalinkRest, PlayerEvent, TrackEndReason,
    TrackSubscription,
    protocol::{IncomingMessage, NodeEvent, OutgoingOp},
};
use crate::{
    common::{
        errors::EngineError,
        types::{ChannelId, GuildId, UserId},
    },
    configs::EngineConfig,
    gateway::{VoiceStateSender, session::backoff::Backoff},
    voice::VoiceState,
};

const BACKOFF_BASE_MS: u64 = 1_000;
/// Caps the node reconnect delay at 8s.
const BACKOFF_MAX_SHIFT: u32 = 3;
const CLIENT_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Per-guild bookkeeping on the node side.
#[derive(Default)]
struct PlayerLink {
    /// Sender of the live subscription, if any.
    events: Option<UnboundedSender<PlayerEvent>>,
    channel_id: Option<ChannelId>,
    session_id: Option<String>,
    voice_server: Option<Value>,
    playing: bool,
}

pub(crate) struct NodeInner {
    config: EngineConfig,
    rest: LavalinkRest,
    voice: Arc<dyn VoiceStateSender>,
    user_id: Mutex<Option<UserId>>,
    links: DashMap<GuildId, PlayerLink>,
    outbound: Mutex<Option<UnboundedSender<Message>>>,
    started: AtomicBool,
    cancel: CancellationToken,
}

/// Client for one Lavalink v3 node.
#[derive(Clone)]
pub struct LavalinkNode {
    inner: Arc<NodeInner>,
}

impl LavalinkNode {
    pub fn new(
        config: EngineConfig,
        client: reqwest::Client,
        voice: Arc<dyn VoiceStateSender>,
    ) -> Self {
        let rest = LavalinkRest::new(client, config.http_url(), config.password.clone());
        Self {
            inner: Arc::new(NodeInner {
                config,
                rest,
                voice,
                user_id: Mutex::new(None),
                links: DashMap::new(),
                outbound: Mutex::new(None),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn rest(&self) -> &LavalinkRest {
        &self.inner.rest
    }

    /// Starts the socket loop once the bot's user id is known. Later calls
    /// only refresh the user id.
    pub fn start(&self, user_id: UserId) {
        *self.inner.user_id.lock() = Some(user_id);
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move { this.run(user_id).await });
    }

    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    async fn run(self, user_id: UserId) {
        let mut backoff = Backoff::new(BACKOFF_BASE_MS, BACKOFF_MAX_SHIFT);
        loop {
            if self.inner.cancel.is_cancelled() {
                return;
            }

            match self.connect_once(user_id, &mut backoff).await {
                Ok(()) => info!("Audio node connection closed"),
                Err(e) => warn!("Audio node connection failed: {}", e),
            }
            *self.inner.outbound.lock() = None;
            self.fail_all_players();

            let delay = backoff.next();
            debug!(
                "Reconnecting to audio node in {:?} (attempt {})",
                delay,
                backoff.attempt()
            );
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_once(&self, user_id: UserId, backoff: &mut Backoff) -> Result<(), EngineError> {
        let url = self.inner.config.ws_url();
        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header(&self.inner.config.password)?);
        headers.insert("User-Id", header(&user_id.to_string())?);
        headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        info!("Connected to audio node at {}", url);
        backoff.reset();

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.inner.outbound.lock() = Some(tx);

        let write_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    warn!("Audio node write error: {}", e);
                    break;
                }
            }
        });

        // Voice sessions that came up while the node was away.
        let pending: Vec<GuildId> = self.inner.links.iter().map(|l| *l.key()).collect();
        for guild_id in pending {
            self.flush_voice_update(guild_id);
        }

        let result = loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break Ok(()),
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Audio node sent close: {:?}", frame);
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(EngineError::Socket(e)),
                    None => break Ok(()),
                }
            }
        };

        *self.inner.outbound.lock() = None;
        write_task.abort();
        result
    }

    /// Every live subscription loses its player when the node goes away.
    fn fail_all_players(&self) {
        for mut link in self.inner.links.iter_mut() {
            link.playing = false;
            if let Some(tx) = link.events.take() {
                let _ = tx.send(PlayerEvent::Disconnected);
            }
        }
    }

    pub fn handle_text(&self, text: &str) {
        let msg: IncomingMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("Ignoring malformed audio node message: {} - Text: {}", e, text);
                return;
            }
        };

        match msg {
            IncomingMessage::Event(event) => self.route_event(event),
            IncomingMessage::PlayerUpdate { guild_id, state } => {
                trace!(
                    "[{}] Player at {}ms (connected: {})",
                    guild_id, state.position, state.connected
                );
            }
            IncomingMessage::Stats | IncomingMessage::Unknown => {}
        }
    }

    fn route_event(&self, event: NodeEvent) {
        let guild_id = event.guild_id();
        let Some(mut link) = self.inner.links.get_mut(&guild_id) else {
            debug!("[{}] Event for unknown player: {:?}", guild_id, event);
            return;
        };

        let signal = match event {
            NodeEvent::TrackStartEvent { .. } => {
                link.playing = true;
                Some(PlayerEvent::TrackStart)
            }
            NodeEvent::TrackEndEvent {
                reason: TrackEndReason::Replaced,
                ..
            } => {
                debug!("[{}] Track replaced", guild_id);
                None
            }
            NodeEvent::TrackEndEvent { reason, .. } => {
                link.playing = false;
                Some(PlayerEvent::TrackEnd { reason })
            }
            NodeEvent::TrackStuckEvent { threshold_ms, .. } => {
                Some(PlayerEvent::TrackStuck { threshold_ms })
            }
            NodeEvent::TrackExceptionEvent {
                error, exception, ..
            } => {
                let message = exception
                    .and_then(|e| e.message)
                    .or(error)
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!("[{}] Track exception: {}", guild_id, message);
                Some(PlayerEvent::TrackException { message })
            }
            NodeEvent::WebSocketClosedEvent {
                code,
                reason,
                by_remote,
                ..
            } => {
                warn!(
                    "[{}] Voice socket closed: code={}, reason='{}', by_remote={}",
                    guild_id, code, reason, by_remote
                );
                None
            }
        };

        if let (Some(signal), Some(tx)) = (signal, link.events.as_ref()) {
            let _ = tx.send(signal);
        }
    }

    /// Tracks the bot's own voice state for guilds with a player.
    pub fn handle_voice_state(&self, state: &VoiceState) {
        if Some(state.user_id) != *self.inner.user_id.lock() {
            return;
        }
        let Some(guild_id) = state.guild_id else {
            return;
        };

        {
            let Some(mut link) = self.inner.links.get_mut(&guild_id) else {
                return;
            };

            let signal = match state.channel_id {
                None => {
                    link.session_id = None;
                    link.voice_server = None;
                    link.channel_id.take().map(|_| PlayerEvent::Disconnected)
                }
                Some(channel_id) => {
                    let moved = link
                        .channel_id
                        .replace(channel_id)
                        .filter(|old| *old != channel_id)
                        .map(|_| PlayerEvent::ChannelMove { channel_id });
                    link.session_id = Some(state.session_id.clone());
                    moved
                }
            };

            if let Some(signal) = signal {
                debug!("[{}] Voice signal: {}", guild_id, signal.name());
                if let Some(tx) = link.events.as_ref() {
                    let _ = tx.send(signal);
                }
            }
        }

        self.flush_voice_update(guild_id);
    }

    pub fn handle_voice_server(&self, guild_id: GuildId, event: Value) {
        match self.inner.links.get_mut(&guild_id) {
            Some(mut link) => link.voice_server = Some(event),
            None => return,
        }
        self.flush_voice_update(guild_id);
    }

    /// Sends `voiceUpdate` once both halves of the voice handshake are known.
    fn flush_voice_update(&self, guild_id: GuildId) {
        let op = {
            let Some(link) = self.inner.links.get(&guild_id) else {
                return;
            };
            match (&link.session_id, &link.voice_server) {
                (Some(session_id), Some(event)) => OutgoingOp::VoiceUpdate {
                    guild_id,
                    session_id: session_id.clone(),
                    event: event.clone(),
                },
                _ => return,
            }
        };

        if let Err(e) = self.send_op(&op) {
            warn!("[{}] Voice update not sent: {}", guild_id, e);
        }
    }

    pub(crate) fn send_op(&self, op: &OutgoingOp) -> Result<(), EngineError> {
        let json = serde_json::to_string(op)?;
        let outbound = self.inner.outbound.lock();
        let tx = outbound.as_ref().ok_or(EngineError::NotConnected)?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| EngineError::NotConnected)
    }

    pub(crate) fn voice(&self) -> &dyn VoiceStateSender {
        self.inner.voice.as_ref()
    }

    /// Replaces the guild's subscription; the previous one ends.
    pub(crate) fn subscribe(&self, guild_id: GuildId) -> Result<TrackSubscription, EngineError> {
        let mut link = self
            .inner
            .links
            .get_mut(&guild_id)
            .ok_or(EngineError::PlayerGone(guild_id))?;
        let (tx, subscription) = TrackSubscription::channel();
        link.events = Some(tx);
        Ok(subscription)
    }

    pub(crate) fn set_playing(&self, guild_id: GuildId, playing: bool) {
        if let Some(mut link) = self.inner.links.get_mut(&guild_id) {
            link.playing = playing;
        }
    }

    pub(crate) fn is_playing(&self, guild_id: GuildId) -> bool {
        self.inner
            .links
            .get(&guild_id)
            .is_some_and(|link| link.playing)
    }

    pub(crate) fn remove_link(&self, guild_id: GuildId) {
        self.inner.links.remove(&guild_id);
    }
}

fn header(value: &str) -> Result<HeaderValue, EngineError> {
    HeaderValue::from_str(value).map_err(|e| {
        EngineError::Socket(tokio_tungstenite::tungstenite::Error::HttpFormat(
            http::Error::from(e),
        ))
    })
}

#[async_trait]
impl AudioEngine for LavalinkNode {
    async fn create_player(&self, guild_id: GuildId) -> Result<Arc<dyn EnginePlayer>, EngineError> {
        self.inner.links.entry(guild_id).or_default();
        debug!("[{}] Player created", guild_id);
        Ok(Arc::new(LavalinkPlayer::new(guild_id, self.clone())))
    }
}
