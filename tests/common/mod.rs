#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use ruka::{
    common::{
        errors::EngineError,
        types::{ChannelId, GuildId, MessageId, UserId},
    },
    engine::{
        AudioEngine, EnginePlayer, LoadTracksResponse, LoadType, LoadedTrack, PlayerEvent,
        TrackEndReason, TrackLoader, TrackSubscription, protocol::TrackInfo,
    },
    player::{
        AnnounceTarget, Announcer, ChannelLookup, CommandOrigin, GuildSessionRegistry,
        PlaybackOrchestrator, Track,
    },
    sources::TrackResolver,
    voice::{VoiceState, VoiceStateStore},
};
use tokio::sync::mpsc;

pub const GUILD: GuildId = GuildId(100);
pub const VOICE_CHANNEL: ChannelId = ChannelId(200);
pub const TEXT_CHANNEL: ChannelId = ChannelId(300);
pub const USER: UserId = UserId(400);

/// A player that records calls and lets the test push engine events.
pub struct MockPlayer {
    pub guild_id: GuildId,
    calls: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedSender<PlayerEvent>>>,
    playing: AtomicBool,
}

impl MockPlayer {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            playing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("play:").map(str::to_string))
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Publishes an event to the current subscription.
    pub fn emit(&self, event: PlayerEvent) {
        match &event {
            PlayerEvent::TrackStart => self.playing.store(true, Ordering::SeqCst),
            PlayerEvent::TrackEnd { .. } | PlayerEvent::Disconnected => {
                self.playing.store(false, Ordering::SeqCst)
            }
            _ => {}
        }
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn finish(&self) {
        self.emit(PlayerEvent::TrackEnd {
            reason: TrackEndReason::Finished,
        });
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl EnginePlayer for MockPlayer {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    async fn connect(&self, channel_id: ChannelId) -> Result<(), EngineError> {
        self.record(format!("connect:{}", channel_id));
        Ok(())
    }

    async fn play(&self, encoded: &str) -> Result<TrackSubscription, EngineError> {
        let (tx, subscription) = TrackSubscription::channel();
        *self.events.lock() = Some(tx);
        self.playing.store(true, Ordering::SeqCst);
        self.record(format!("play:{}", encoded));
        Ok(subscription)
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.record("pause");
        Ok(())
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.record("resume");
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.record("stop");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), EngineError> {
        self.events.lock().take();
        self.playing.store(false, Ordering::SeqCst);
        self.record("destroy");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EngineError> {
        self.record("disconnect");
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockEngine {
    pub players: Mutex<Vec<Arc<MockPlayer>>>,
    pub created: AtomicUsize,
}

impl MockEngine {
    pub fn player(&self) -> Arc<MockPlayer> {
        self.players
            .lock()
            .last()
            .cloned()
            .expect("no player was created")
    }
}

#[async_trait]
impl AudioEngine for MockEngine {
    async fn create_player(&self, guild_id: GuildId) -> Result<Arc<dyn EnginePlayer>, EngineError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let player = Arc::new(MockPlayer::new(guild_id));
        self.players.lock().push(player.clone());
        Ok(player)
    }
}

pub fn loaded(title: &str) -> LoadedTrack {
    LoadedTrack {
        track: format!("enc:{}", title),
        info: TrackInfo {
            identifier: title.to_string(),
            is_seekable: true,
            author: "someone".to_string(),
            length: 180_000,
            is_stream: false,
            position: 0,
            title: title.to_string(),
            uri: Some(format!("https://www.youtube.com/watch?v={}", title)),
            source_name: Some("youtube".to_string()),
        },
    }
}

/// Answers `ytsearch:<q>` with a single track titled `q`, and any identifier
/// registered with [`MockLoader::playlist`] with its tracks.
#[derive(Default)]
pub struct MockLoader {
    playlists: HashMap<String, Vec<String>>,
    misses: Vec<String>,
    pub requests: Mutex<Vec<String>>,
}

impl MockLoader {
    pub fn playlist(mut self, link: &str, titles: &[&str]) -> Self {
        self.playlists.insert(
            link.to_string(),
            titles.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn miss(mut self, query: &str) -> Self {
        self.misses.push(query.to_string());
        self
    }
}

#[async_trait]
impl TrackLoader for MockLoader {
    async fn load_tracks(&self, identifier: &str) -> Result<LoadTracksResponse, EngineError> {
        self.requests.lock().push(identifier.to_string());

        if let Some(titles) = self.playlists.get(identifier) {
            let mut resp = LoadTracksResponse::empty(LoadType::PlaylistLoaded);
            resp.tracks = titles.iter().map(|t| loaded(t)).collect();
            return Ok(resp);
        }

        match identifier.strip_prefix("ytsearch:") {
            Some(query) if !self.misses.iter().any(|m| m == query) => {
                let mut resp = LoadTracksResponse::empty(LoadType::SearchResult);
                resp.tracks = vec![loaded(query)];
                Ok(resp)
            }
            _ => Ok(LoadTracksResponse::empty(LoadType::NoMatches)),
        }
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub lines: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn now_playing(&self, _target: &AnnounceTarget, track: &Track) {
        self.lines.lock().push(format!("now playing {}", track.title));
    }

    async fn finished(&self, _target: &AnnounceTarget) {
        self.lines.lock().push("finished".to_string());
    }

    async fn track_stuck(&self, _target: &AnnounceTarget) {
        self.lines.lock().push("stuck".to_string());
    }
}

/// Knows a fixed set of channels.
#[derive(Default)]
pub struct StaticChannels(pub HashMap<ChannelId, GuildId>);

#[async_trait]
impl ChannelLookup for StaticChannels {
    async fn guild_of(&self, channel_id: ChannelId) -> Option<GuildId> {
        self.0.get(&channel_id).copied()
    }
}

pub struct Harness {
    pub orchestrator: PlaybackOrchestrator,
    pub registry: Arc<GuildSessionRegistry>,
    pub engine: Arc<MockEngine>,
    pub loader: Arc<MockLoader>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub voice: Arc<VoiceStateStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_loader(MockLoader::default())
    }

    pub fn with_loader(loader: MockLoader) -> Self {
        let registry = Arc::new(GuildSessionRegistry::new());
        let engine = Arc::new(MockEngine::default());
        let loader = Arc::new(loader);
        let announcer = Arc::new(RecordingAnnouncer::default());
        let voice = Arc::new(VoiceStateStore::new());
        let channels = Arc::new(StaticChannels(HashMap::from([(VOICE_CHANNEL, GUILD)])));

        let orchestrator = PlaybackOrchestrator::new(
            registry.clone(),
            Arc::new(TrackResolver::new(loader.clone(), None)),
            engine.clone(),
            voice.clone(),
            channels,
            announcer.clone(),
        );

        Self {
            orchestrator,
            registry,
            engine,
            loader,
            announcer,
            voice,
        }
    }

    /// Puts `user` in the voice channel, optionally without a guild id.
    pub fn join_voice(&self, user: UserId, with_guild: bool) {
        self.voice.update(&VoiceState {
            guild_id: with_guild.then_some(GUILD),
            channel_id: Some(VOICE_CHANNEL),
            user_id: user,
            session_id: String::new(),
        });
    }

    pub fn origin(&self) -> CommandOrigin {
        CommandOrigin {
            user_id: USER,
            channel_id: TEXT_CHANNEL,
            message_id: Some(MessageId(1)),
        }
    }

    pub async fn queue_titles(&self) -> Vec<String> {
        self.registry
            .get(GUILD)
            .await
            .map(|s| s.queue.iter().map(|t| t.title.clone()).collect())
            .unwrap_or_default()
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition never became true"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
