use async_trait::async_trait;
use tracing::warn;

use crate::{
    common::types::{ChannelId, GuildId},
    player::{AnnounceTarget, Announcer, ChannelLookup, MusicError, Track},
    rest::{CreateMessage, Embed, RestClient},
};

pub const COLOR_NEUTRAL: u32 = 0x2F3136;
pub const COLOR_ERROR: u32 = 0xFF0000;

/// `[title](link) (<@requester>)`, or just the title without a link.
pub fn describe_track(track: &Track) -> String {
    let title = match &track.link {
        Some(link) => format!("[{}]({})", track.title, link),
        None => track.title.clone(),
    };
    format!("{} (<@{}>)", title, track.requester)
}

pub fn error_embed(error: &MusicError) -> Embed {
    Embed::described(COLOR_ERROR, format!(":x: {}", error))
}

pub fn added_embed(tracks: &[Track]) -> Embed {
    let text = match tracks {
        [track] => format!(":information_source: Added {} to queue", describe_track(track)),
        _ => format!(":information_source: Added {} songs to queue", tracks.len()),
    };
    Embed::described(COLOR_NEUTRAL, text)
}

pub fn queue_embed(tracks: &[Track]) -> Embed {
    tracks.iter().enumerate().fold(
        Embed {
            color: Some(COLOR_NEUTRAL),
            ..Default::default()
        }
        .title("Current Queue"),
        |embed, (i, track)| {
            let value = if i == 0 {
                format!(":arrow_forward: Currently Playing: {}", describe_track(track))
            } else {
                describe_track(track)
            };
            embed.field(format!("Track {}", i + 1), value)
        },
    )
}

/// Sends embeds as replies through the REST client.
#[derive(Clone)]
pub struct RestAnnouncer {
    rest: RestClient,
}

impl RestAnnouncer {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn send(&self, target: &AnnounceTarget, embed: Embed) {
        let mut message = CreateMessage::embed(embed);
        if let Some(message_id) = target.message_id {
            message = message.reply_to(target.channel_id, message_id);
        }
        if self
            .rest
            .create_message(target.channel_id, &message)
            .await
            .is_none()
        {
            warn!("Announcement to {} was not delivered", target.channel_id);
        }
    }
}

#[async_trait]
impl Announcer for RestAnnouncer {
    async fn now_playing(&self, target: &AnnounceTarget, track: &Track) {
        let text = format!(":arrow_forward: Now playing: {}", describe_track(track));
        self.send(target, Embed::described(COLOR_NEUTRAL, text)).await;
    }

    async fn finished(&self, target: &AnnounceTarget) {
        self.send(
            target,
            Embed::described(COLOR_NEUTRAL, ":white_check_mark: Finished playing!"),
        )
        .await;
    }

    async fn track_stuck(&self, target: &AnnounceTarget) {
        self.send(
            target,
            Embed::described(COLOR_ERROR, ":warning: Track stuck; attempting to resume"),
        )
        .await;
    }
}

#[async_trait]
impl ChannelLookup for RestClient {
    async fn guild_of(&self, channel_id: ChannelId) -> Option<GuildId> {
        self.get_channel(channel_id).await?.guild_id
    }
}
