mod common;

use std::{sync::atomic::Ordering, time::Duration};

use common::*;
use ruka::{
    common::types::UserId,
    engine::{PlayerEvent, TrackEndReason},
    player::{AnnounceTarget, MusicError, QUEUE_LISTING_LIMIT, Track},
};

fn track(title: &str) -> Track {
    Track {
        title: title.to_string(),
        link: None,
        encoded: format!("enc:{}", title),
        requester: USER,
    }
}

fn target() -> AnnounceTarget {
    AnnounceTarget {
        channel_id: TEXT_CHANNEL,
        message_id: None,
    }
}

async fn wait_for_plays(player: &MockPlayer, n: usize) {
    eventually(|| async move { player.plays().len() == n }).await;
}

#[tokio::test]
async fn test_first_play_creates_session_and_starts_head() {
    let h = Harness::new();
    h.join_voice(USER, true);

    let tracks = h.orchestrator.play(&h.origin(), "song a").await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].requester, USER);

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;
    assert_eq!(player.plays(), vec!["enc:song a"]);
    assert_eq!(player.calls()[0], format!("connect:{}", VOICE_CHANNEL));
    assert_eq!(h.loader.requests.lock().clone(), vec!["ytsearch:song a"]);

    player.emit(PlayerEvent::TrackStart);
    player.emit(PlayerEvent::TrackStart);
    let announcer = h.announcer.as_ref();
    eventually(|| async move { !announcer.lines().is_empty() }).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(announcer.lines(), vec!["now playing song a"]);
}

#[tokio::test]
async fn test_last_track_end_tears_the_session_down() {
    let h = Harness::new();
    h.join_voice(USER, true);
    h.orchestrator.play(&h.origin(), "only").await.unwrap();

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;
    player.finish();

    let announcer = h.announcer.as_ref();
    eventually(|| async move { announcer.lines().contains(&"finished".to_string()) }).await;
    assert!(!h.registry.contains(GUILD).await);
    assert_eq!(player.count("disconnect"), 1);
    assert_eq!(player.count("destroy"), 1);
}

#[tokio::test]
async fn test_loop_moves_finished_track_to_tail() {
    let h = Harness::new();
    h.join_voice(USER, true);
    h.orchestrator.play(&h.origin(), "a").await.unwrap();
    h.orchestrator.play(&h.origin(), "b").await.unwrap();

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;
    assert_eq!(h.orchestrator.toggle_loop(USER).await, Ok(true));

    player.finish();
    wait_for_plays(&player, 2).await;
    assert_eq!(player.plays(), vec!["enc:a", "enc:b"]);
    assert_eq!(h.queue_titles().await, vec!["b", "a"]);
}

#[tokio::test]
async fn test_back_to_back_plays_share_one_loop() {
    let h = Harness::new();
    h.join_voice(USER, true);
    let origin = h.origin();

    let (first, second) = tokio::join!(
        h.orchestrator.play(&origin, "a"),
        h.orchestrator.play(&origin, "b")
    );
    assert!(first.is_ok() && second.is_ok());

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.engine.created.load(Ordering::SeqCst), 1);
    assert_eq!(player.plays(), vec!["enc:a"]);
    assert_eq!(h.queue_titles().await, vec!["a", "b"]);
}

#[tokio::test]
async fn test_commands_without_playback_change_nothing() {
    let h = Harness::new();
    assert_eq!(h.orchestrator.skip(USER).await, Err(MusicError::NotInVoice));

    h.join_voice(USER, true);
    assert_eq!(h.orchestrator.skip(USER).await, Err(MusicError::NothingPlaying));
    assert_eq!(h.orchestrator.clear(USER).await, Err(MusicError::NothingPlaying));
    assert_eq!(h.orchestrator.shuffle(USER).await, Err(MusicError::NothingPlaying));
    assert_eq!(
        h.orchestrator.toggle_loop(USER).await,
        Err(MusicError::NothingPlaying)
    );
    assert_eq!(
        h.orchestrator.queue(USER).await.err(),
        Some(MusicError::NothingPlaying)
    );

    assert!(!h.registry.contains(GUILD).await);
    assert_eq!(h.engine.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skip_stops_and_lets_track_end_advance() {
    let h = Harness::new();
    h.join_voice(USER, true);
    h.orchestrator.play(&h.origin(), "a").await.unwrap();
    h.orchestrator.play(&h.origin(), "b").await.unwrap();

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;

    let skipped = h.orchestrator.skip(USER).await.unwrap();
    assert_eq!(skipped.title, "a");
    assert_eq!(player.count("stop"), 1);
    assert_eq!(h.queue_titles().await, vec!["a", "b"]);

    player.emit(PlayerEvent::TrackEnd {
        reason: TrackEndReason::Stopped,
    });
    wait_for_plays(&player, 2).await;
    assert_eq!(player.plays()[1], "enc:b");
    assert_eq!(h.queue_titles().await, vec!["b"]);
}

#[tokio::test]
async fn test_shuffle_restarts_from_new_head_without_popping() {
    let h = Harness::new();
    h.join_voice(USER, true);
    let titles = ["a", "b", "c", "d", "e", "f"];
    h.orchestrator
        .enqueue(
            GUILD,
            VOICE_CHANNEL,
            titles.iter().map(|t| track(t)).collect(),
            target(),
        )
        .await
        .unwrap();

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;

    h.orchestrator.shuffle(USER).await.unwrap();
    assert_eq!(player.count("stop"), 1);

    let shuffled = h.queue_titles().await;
    let mut sorted = shuffled.clone();
    sorted.sort();
    assert_eq!(sorted, titles);

    player.emit(PlayerEvent::TrackEnd {
        reason: TrackEndReason::Stopped,
    });
    wait_for_plays(&player, 2).await;
    assert_eq!(player.plays()[1], format!("enc:{}", shuffled[0]));
    assert_eq!(h.queue_titles().await, shuffled);
}

#[tokio::test]
async fn test_queue_listing_is_capped() {
    let h = Harness::new();
    h.join_voice(USER, true);
    let tracks: Vec<Track> = (0..30).map(|i| track(&format!("t{}", i))).collect();
    h.orchestrator
        .enqueue(GUILD, VOICE_CHANNEL, tracks, target())
        .await
        .unwrap();
    wait_for_plays(&h.engine.player(), 1).await;

    let listing = h.orchestrator.queue(USER).await.unwrap();
    assert_eq!(listing.len(), QUEUE_LISTING_LIMIT);
    assert_eq!(listing[0].title, "t0");
    assert_eq!(listing[24].title, "t24");
}

#[tokio::test]
async fn test_voice_disconnect_drops_the_queue() {
    let h = Harness::new();
    h.join_voice(USER, true);
    h.orchestrator.play(&h.origin(), "a").await.unwrap();
    h.orchestrator.play(&h.origin(), "b").await.unwrap();

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;
    player.emit(PlayerEvent::Disconnected);

    let p = player.as_ref();
    eventually(|| async move { p.count("destroy") == 1 }).await;
    assert!(!h.registry.contains(GUILD).await);
    assert_eq!(player.count("stop"), 1);
    assert_eq!(player.count("disconnect"), 0);
    assert!(!h.announcer.lines().contains(&"finished".to_string()));
}

#[tokio::test]
async fn test_stuck_and_moved_players_are_nudged() {
    let h = Harness::new();
    h.join_voice(USER, true);
    h.orchestrator.play(&h.origin(), "a").await.unwrap();

    let player = h.engine.player();
    wait_for_plays(&player, 1).await;

    player.emit(PlayerEvent::TrackStuck { threshold_ms: 10_000 });
    player.emit(PlayerEvent::ChannelMove {
        channel_id: ruka::common::types::ChannelId(999),
    });

    let p = player.as_ref();
    eventually(|| async move { p.count("resume") == 2 }).await;
    assert_eq!(player.count("pause"), 2);
    assert_eq!(player.count("stop"), 0);
    assert_eq!(h.queue_titles().await, vec!["a"]);
    assert!(h.announcer.lines().contains(&"stuck".to_string()));
}

#[tokio::test]
async fn test_clear_then_play_starts_fresh() {
    let h = Harness::new();
    h.join_voice(USER, true);
    h.orchestrator.play(&h.origin(), "a").await.unwrap();
    wait_for_plays(&h.engine.player(), 1).await;

    h.orchestrator.clear(USER).await.unwrap();
    let first = h.engine.player();
    assert_eq!(first.count("disconnect"), 1);
    assert_eq!(first.count("destroy"), 1);
    assert!(!h.registry.contains(GUILD).await);

    h.orchestrator.play(&h.origin(), "b").await.unwrap();
    let second = h.engine.player();
    wait_for_plays(&second, 1).await;
    assert_eq!(h.engine.created.load(Ordering::SeqCst), 2);
    assert_eq!(second.plays(), vec!["enc:b"]);
    assert_eq!(first.plays(), vec!["enc:a"]);
}

#[tokio::test]
async fn test_guild_is_found_through_the_channel() {
    let h = Harness::new();
    h.join_voice(USER, false);
    h.orchestrator.play(&h.origin(), "a").await.unwrap();
    assert!(h.registry.contains(GUILD).await);

    let stranger = ruka::voice::VoiceState {
        guild_id: None,
        channel_id: Some(ruka::common::types::ChannelId(555)),
        user_id: UserId(402),
        session_id: String::new(),
    };
    h.voice.update(&stranger);
    assert_eq!(
        h.orchestrator.skip(UserId(402)).await,
        Err(MusicError::GuildNotFound)
    );
}

#[tokio::test]
async fn test_play_rejects_empty_and_unmatched_queries() {
    let h = Harness::with_loader(MockLoader::default().miss("nothing at all"));
    h.join_voice(USER, true);

    assert_eq!(
        h.orchestrator.play(&h.origin(), "   ").await.err(),
        Some(MusicError::NoQuery)
    );
    assert_eq!(
        h.orchestrator.play(&h.origin(), "nothing at all").await.err(),
        Some(MusicError::NoResults)
    );
    assert_eq!(h.engine.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_enqueue_without_tracks_creates_nothing() {
    let h = Harness::new();
    h.join_voice(USER, true);

    assert_eq!(
        h.orchestrator
            .enqueue(GUILD, VOICE_CHANNEL, Vec::new(), target())
            .await,
        Err(MusicError::NoResults)
    );
    assert_eq!(h.engine.created.load(Ordering::SeqCst), 0);
    assert!(!h.registry.contains(GUILD).await);
    assert!(h.registry.existing(GUILD).is_none());
}

#[tokio::test]
async fn test_playlist_link_queues_every_track() {
    let link = "https://www.youtube.com/playlist?list=PL123";
    let h = Harness::with_loader(MockLoader::default().playlist(link, &["x", "y", "z"]));
    h.join_voice(USER, true);

    let tracks = h.orchestrator.play(&h.origin(), link).await.unwrap();
    assert_eq!(tracks.len(), 3);
    assert!(tracks.iter().all(|t| t.requester == USER));
    assert_eq!(h.queue_titles().await, vec!["x", "y", "z"]);
}

#[tokio::test]
async fn test_shorts_are_not_played() {
    let h = Harness::new();
    h.join_voice(USER, true);
    assert_eq!(
        h.orchestrator
            .play(&h.origin(), "https://www.youtube.com/shorts/abc123")
            .await
            .err(),
        Some(MusicError::NoResults)
    );
    assert!(h.loader.requests.lock().is_empty());
}
