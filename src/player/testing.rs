use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AnnounceTarget, Announcer, GuildPlaybackSession, Track};
use crate::{
    common::{
        errors::EngineError,
        types::{ChannelId, GuildId, UserId},
    },
    engine::{EnginePlayer, TrackSubscription},
};

/// Player that does nothing but remember which calls it got.
#[derive(Default)]
pub(crate) struct RecordingPlayer {
    pub calls: Mutex<Vec<&'static str>>,
}

impl RecordingPlayer {
    pub fn called(&self, name: &str) -> bool {
        self.calls.lock().contains(&name)
    }

    fn record(&self, name: &'static str) -> Result<(), EngineError> {
        self.calls.lock().push(name);
        Ok(())
    }
}

#[async_trait]
impl EnginePlayer for RecordingPlayer {
    fn guild_id(&self) -> GuildId {
        GuildId(1)
    }
    async fn connect(&self, _: ChannelId) -> Result<(), EngineError> {
        self.record("connect")
    }
    async fn play(&self, _: &str) -> Result<TrackSubscription, EngineError> {
        self.record("play")?;
        Ok(TrackSubscription::channel().1)
    }
    async fn pause(&self) -> Result<(), EngineError> {
        self.record("pause")
    }
    async fn resume(&self) -> Result<(), EngineError> {
        self.record("resume")
    }
    async fn stop(&self) -> Result<(), EngineError> {
        self.record("stop")
    }
    async fn destroy(&self) -> Result<(), EngineError> {
        self.record("destroy")
    }
    async fn disconnect(&self) -> Result<(), EngineError> {
        self.record("disconnect")
    }
    fn is_playing(&self) -> bool {
        false
    }
}

pub(crate) struct SilentAnnouncer;

#[async_trait]
impl Announcer for SilentAnnouncer {
    async fn now_playing(&self, _: &AnnounceTarget, _: &Track) {}
    async fn finished(&self, _: &AnnounceTarget) {}
    async fn track_stuck(&self, _: &AnnounceTarget) {}
}

pub(crate) fn track(title: &str) -> Track {
    Track {
        title: title.to_string(),
        link: None,
        encoded: format!("enc:{}", title),
        requester: UserId(7),
    }
}

/// Session for guild 1 with the given queue.
pub(crate) fn session_with(
    generation: u64,
    player: Arc<RecordingPlayer>,
    titles: &[&str],
) -> GuildPlaybackSession {
    let mut s = GuildPlaybackSession::new(
        generation,
        GuildId(1),
        player,
        AnnounceTarget {
            channel_id: ChannelId(2),
            message_id: None,
        },
    );
    s.enqueue(titles.iter().map(|t| track(t)));
    s
}
