//! End-to-end tests for the playback controller
//!
//! This test suite verifies:
//! - Session lifecycle (play, pause, resume, stop, release, looping)
//! - Event order and payloads per session
//! - Shared-output activation across sessions
//! - Teardown of engine observers and stale callbacks
//! - Call validation, deferred `setUrl` replies and shutdown
//! - Now-playing and remote-control routing

mod support;

use bridge_traits::{
    CategoryOptions, EngineNotification, HeadlessRunner, OutputCategory, RemoteCommand,
};
use core_playback::{PlaybackError, PlayerStatus, Reply};
use core_runtime::events::PlayerEventKind;
use serde_json::json;
use std::time::Duration;
use support::{FakeFactory, FakeRunner, Harness, TRACK_DURATION};

async fn play(harness: &Harness, id: &str, url: &str) {
    let reply = harness
        .controller
        .invoke("play", json!({ "playerId": id, "url": url, "isLocal": false }))
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
}

async fn status(harness: &Harness, id: &str) -> Option<PlayerStatus> {
    let snapshot = harness.controller.snapshot().await.unwrap();
    snapshot.session(id).map(|session| session.status)
}

fn pending_kinds(harness: &mut Harness) -> Vec<PlayerEventKind> {
    let mut kinds = Vec::new();
    while let Some(Ok(event)) = harness.events.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

// ============================================================================
// Playback Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn play_reports_duration_then_position_ticks() {
    let mut harness = Harness::start(FakeFactory::ready());

    play(&harness, "a", "http://x/1.mp3").await;

    let event = harness.next_event().await;
    assert_eq!(event.player_id, "a");
    assert_eq!(event.kind, PlayerEventKind::Duration(5000));

    let mut position = 0;
    for _ in 0..5 {
        match harness.next_event().await.kind {
            PlayerEventKind::CurrentPosition(ms) => position = ms,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!((950..=1050).contains(&position), "position {position}");
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));
}

#[tokio::test(start_paused = true)]
async fn play_applies_start_position_and_volume() {
    let mut harness = Harness::start(FakeFactory::ready());

    let reply = harness
        .controller
        .invoke(
            "play",
            json!({ "playerId": "a", "url": "http://x/1.mp3", "volume": 0.5, "position": 2000 }),
        )
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
    harness.settle().await;

    let engine = harness.factory.last();
    assert_eq!(engine.volume(), 0.5);
    assert_eq!(engine.seeks(), vec![Duration::from_millis(2000)]);

    // The start seek is internal and reports no completion.
    let kinds = pending_kinds(&mut harness);
    assert_eq!(kinds, vec![PlayerEventKind::Duration(5000)]);
}

#[tokio::test(start_paused = true)]
async fn deferred_engine_starts_when_ready() {
    let mut harness = Harness::start(FakeFactory::deferred());

    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;
    let engine = harness.factory.last();
    assert!(!engine.is_playing());
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Loading));

    engine.make_ready();

    assert_eq!(harness.next_event().await.kind, PlayerEventKind::Duration(5000));
    assert!(engine.is_playing());
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));
}

#[tokio::test(start_paused = true)]
async fn pause_while_loading_cancels_autoplay() {
    let harness = Harness::start(FakeFactory::deferred());

    play(&harness, "a", "http://x/1.mp3").await;
    harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await
        .unwrap();
    harness.factory.last().make_ready();
    harness.settle().await;

    assert!(!harness.factory.last().is_playing());
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Ready));
}

#[tokio::test(start_paused = true)]
async fn pause_suspends_ticks_and_resume_continues() {
    let mut harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;

    let mut position = 0;
    while position < 400 {
        if let PlayerEventKind::CurrentPosition(ms) = harness.next_event().await.kind {
            position = ms;
        }
    }

    harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await
        .unwrap();
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Paused));
    harness.drain();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(pending_kinds(&mut harness).is_empty());

    harness
        .controller
        .invoke("resume", json!({ "playerId": "a" }))
        .await
        .unwrap();
    match harness.next_event().await.kind {
        PlayerEventKind::CurrentPosition(ms) => {
            assert!((550..=700).contains(&ms), "resumed at {ms}");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stop_rewinds_to_start() {
    let mut harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;
    tokio::time::sleep(Duration::from_millis(700)).await;

    harness
        .controller
        .invoke("stop", json!({ "playerId": "a" }))
        .await
        .unwrap();
    harness.settle().await;

    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Stopped));
    assert_eq!(
        harness
            .controller
            .invoke("getCurrentPosition", json!({ "playerId": "a" }))
            .await,
        Ok(Reply::Millis(0))
    );
    assert!(!pending_kinds(&mut harness)
        .iter()
        .any(|kind| matches!(kind, PlayerEventKind::SeekComplete(_))));
}

#[tokio::test(start_paused = true)]
async fn end_of_stream_without_looping_completes_once() {
    let mut harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;

    harness.factory.last().finish();

    assert_eq!(harness.next_non_tick().await.kind, PlayerEventKind::Duration(5000));
    assert_eq!(harness.next_non_tick().await.kind, PlayerEventKind::Complete);
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Stopped));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!pending_kinds(&mut harness).contains(&PlayerEventKind::Complete));
    assert!(!harness.session.is_active());
}

#[tokio::test(start_paused = true)]
async fn end_of_stream_with_looping_restarts() {
    let mut harness = Harness::start(FakeFactory::ready());
    harness
        .controller
        .invoke(
            "setReleaseMode",
            json!({ "playerId": "a", "releaseMode": "ReleaseMode.LOOP" }),
        )
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;

    let engine = harness.factory.last();
    engine.finish();
    harness.settle().await;

    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));
    assert!(engine.is_playing());
    assert_eq!(engine.plays(), 2);
    assert_eq!(engine.seeks(), vec![Duration::ZERO]);
    assert_eq!(
        harness
            .controller
            .invoke("getCurrentPosition", json!({ "playerId": "a" }))
            .await,
        Ok(Reply::Millis(0))
    );

    let kinds = pending_kinds(&mut harness);
    assert!(!kinds.contains(&PlayerEventKind::Complete));
    assert!(!kinds
        .iter()
        .any(|kind| matches!(kind, PlayerEventKind::SeekComplete(_))));
}

// ============================================================================
// Seeking
// ============================================================================

#[tokio::test(start_paused = true)]
async fn negative_seek_clamps_to_start() {
    let mut harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;
    assert_eq!(harness.next_event().await.kind, PlayerEventKind::Duration(5000));

    let reply = harness
        .controller
        .invoke("seek", json!({ "playerId": "a", "position": -50 }))
        .await;
    assert_eq!(reply, Ok(Reply::Ack));

    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::SeekComplete(true)
    );
    assert_eq!(
        harness.next_event().await.kind,
        PlayerEventKind::CurrentPosition(0)
    );
    assert_eq!(harness.factory.last().seeks(), vec![Duration::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn seek_beyond_duration_clamps_to_end() {
    let mut harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;
    harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await
        .unwrap();
    harness.drain();

    harness
        .controller
        .invoke("seek", json!({ "playerId": "a", "position": 60_000 }))
        .await
        .unwrap();

    assert_eq!(
        harness.next_event().await.kind,
        PlayerEventKind::SeekComplete(true)
    );
    assert_eq!(
        harness.next_event().await.kind,
        PlayerEventKind::CurrentPosition(5000)
    );
    assert_eq!(harness.factory.last().seeks(), vec![TRACK_DURATION]);
}

#[tokio::test(start_paused = true)]
async fn seek_without_source_is_cached() {
    let mut harness = Harness::start(FakeFactory::ready());

    harness
        .controller
        .invoke("seek", json!({ "playerId": "a", "position": 1200 }))
        .await
        .unwrap();

    assert_eq!(
        harness
            .controller
            .invoke("getCurrentPosition", json!({ "playerId": "a" }))
            .await,
        Ok(Reply::Millis(1200))
    );
    assert_eq!(
        harness
            .controller
            .invoke("getDuration", json!({ "playerId": "a" }))
            .await,
        Ok(Reply::Millis(0))
    );
    assert!(pending_kinds(&mut harness).is_empty());

    let reply = harness
        .controller
        .invoke("setUrl", json!({ "playerId": "a", "url": "http://x/1.mp3" }))
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
    let engine = harness.factory.last();
    assert_eq!(engine.seeks(), vec![Duration::from_millis(1200)]);
    assert_eq!(
        harness
            .controller
            .invoke("getCurrentPosition", json!({ "playerId": "a" }))
            .await,
        Ok(Reply::Millis(1200))
    );

    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;
    assert_eq!(harness.factory.opened(), 1);
    assert!(engine.is_playing());
    assert_eq!(engine.seeks(), vec![Duration::from_millis(1200)]);
}

#[tokio::test(start_paused = true)]
async fn seek_before_play_sets_the_start_position() {
    let harness = Harness::start(FakeFactory::ready());

    harness
        .controller
        .invoke("seek", json!({ "playerId": "a", "position": 900 }))
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;

    let engine = harness.factory.last();
    assert!(engine.is_playing());
    assert_eq!(engine.seeks(), vec![Duration::from_millis(900)]);
}

// ============================================================================
// Session Registry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn settings_persist_on_the_same_session() {
    let harness = Harness::start(FakeFactory::ready());

    harness
        .controller
        .invoke("setPlaybackRate", json!({ "playerId": "a", "playbackRate": 1.5 }))
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;

    assert_eq!(harness.factory.last().rate(), 1.5);
    let snapshot = harness.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.sessions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn release_restores_defaults_and_removes_observers() {
    let mut harness = Harness::start(FakeFactory::ready());

    harness
        .controller
        .invoke("setPlaybackRate", json!({ "playerId": "a", "playbackRate": 2.0 }))
        .await
        .unwrap();
    harness
        .controller
        .invoke(
            "setReleaseMode",
            json!({ "playerId": "a", "releaseMode": "ReleaseMode.LOOP" }),
        )
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    let first = harness.factory.last();
    assert!(first.observer_count() > 0);

    harness
        .controller
        .invoke("release", json!({ "playerId": "a" }))
        .await
        .unwrap();
    assert_eq!(first.observer_count(), 0);
    assert!(!first.is_playing());
    let snapshot = harness.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.session("a").map(|s| s.registrations), Some(0));
    assert_eq!(snapshot.session("a").map(|s| s.status), Some(PlayerStatus::Idle));

    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;
    let second = harness.factory.last();
    assert_eq!(harness.factory.opened(), 2);
    assert_eq!(second.rate(), 1.0);
    assert_eq!(second.volume(), 1.0);

    harness.drain();
    second.finish();
    assert_eq!(harness.next_non_tick().await.kind, PlayerEventKind::Complete);
}

#[tokio::test(start_paused = true)]
async fn replacing_the_source_discards_old_callbacks() {
    let mut harness = Harness::start(FakeFactory::ready());

    play(&harness, "a", "http://x/1.mp3").await;
    let first = harness.factory.last();
    play(&harness, "a", "http://x/2.mp3").await;
    harness.settle().await;

    assert_eq!(first.observer_count(), 0);
    assert!(harness.factory.last().observer_count() > 0);

    harness.drain();
    first.notify_stale(EngineNotification::PlaybackEnded);
    first.notify_stale(EngineNotification::StatusChanged(
        bridge_traits::EngineStatus::Failed("late".into()),
    ));
    harness.settle().await;

    let kinds = pending_kinds(&mut harness);
    assert!(!kinds.contains(&PlayerEventKind::Complete));
    assert!(!kinds
        .iter()
        .any(|kind| matches!(kind, PlayerEventKind::Error(_))));
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));
}

#[tokio::test(start_paused = true)]
async fn replaying_the_same_source_reuses_the_engine() {
    let harness = Harness::start(FakeFactory::ready());

    play(&harness, "a", "http://x/1.mp3").await;
    harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;

    assert_eq!(harness.factory.opened(), 1);
    assert_eq!(harness.factory.last().plays(), 2);
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));
}

// ============================================================================
// Shared Output
// ============================================================================

#[tokio::test(start_paused = true)]
async fn output_is_active_while_any_session_plays() {
    let harness = Harness::start(FakeFactory::ready());
    assert!(!harness.session.is_active());

    play(&harness, "a", "http://x/1.mp3").await;
    play(&harness, "b", "http://x/2.mp3").await;
    assert!(harness.session.is_active());
    assert_eq!(harness.session.activation_count(), 1);

    harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await
        .unwrap();
    assert!(harness.session.is_active());

    harness
        .controller
        .invoke("stop", json!({ "playerId": "b" }))
        .await
        .unwrap();
    assert!(!harness.session.is_active());
    assert!(!harness.controller.snapshot().await.unwrap().output_active);

    harness
        .controller
        .invoke("resume", json!({ "playerId": "a" }))
        .await
        .unwrap();
    assert!(harness.session.is_active());
    assert_eq!(harness.session.activation_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn output_category_follows_sessions() {
    let harness = Harness::start(FakeFactory::ready());

    let reply = harness
        .controller
        .invoke(
            "play",
            json!({ "playerId": "ding", "url": "ding.wav", "respectSilence": true, "duckAudio": true }),
        )
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
    assert_eq!(
        harness.session.category(),
        Some((
            OutputCategory::Ambient,
            CategoryOptions {
                mix_with_others: true,
                duck_others: true,
            }
        ))
    );
    assert!(!harness.session.receives_remote_events());

    harness
        .controller
        .invoke(
            "earpieceOrSpeakersToggle",
            json!({ "playerId": "call", "playingRoute": "earpiece" }),
        )
        .await
        .unwrap();
    play(&harness, "call", "voice.mp3").await;
    assert_eq!(
        harness.session.category().map(|(category, _)| category),
        Some(OutputCategory::PlayAndRecord)
    );

    for id in ["ding", "call"] {
        harness
            .controller
            .invoke("release", json!({ "playerId": id }))
            .await
            .unwrap();
    }
    play(&harness, "music", "http://x/1.mp3").await;
    assert_eq!(
        harness.session.category(),
        Some((OutputCategory::Playback, CategoryOptions::default()))
    );
    assert!(harness.session.receives_remote_events());
}

#[tokio::test(start_paused = true)]
async fn category_narrows_when_a_session_stops() {
    let harness = Harness::start(FakeFactory::ready());

    let reply = harness
        .controller
        .invoke(
            "play",
            json!({ "playerId": "rec", "url": "voice.mp3", "recordingActive": true }),
        )
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
    let reply = harness
        .controller
        .invoke(
            "play",
            json!({ "playerId": "ding", "url": "ding.wav", "respectSilence": true }),
        )
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
    play(&harness, "music", "http://x/1.mp3").await;
    assert_eq!(
        harness.session.category().map(|(category, _)| category),
        Some(OutputCategory::PlayAndRecord)
    );

    harness
        .controller
        .invoke("stop", json!({ "playerId": "rec" }))
        .await
        .unwrap();
    assert_eq!(
        harness.session.category(),
        Some((
            OutputCategory::Ambient,
            CategoryOptions {
                mix_with_others: true,
                duck_others: false,
            }
        ))
    );
    assert!(harness.session.is_active());

    harness
        .controller
        .invoke("release", json!({ "playerId": "ding" }))
        .await
        .unwrap();
    assert_eq!(
        harness.session.category(),
        Some((OutputCategory::Playback, CategoryOptions::default()))
    );
    assert!(harness.session.is_active());

    harness
        .controller
        .invoke("pause", json!({ "playerId": "music" }))
        .await
        .unwrap();
    assert_eq!(
        harness.session.category(),
        Some((OutputCategory::Playback, CategoryOptions::default()))
    );
    assert!(!harness.session.is_active());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn open_failure_reports_error_event() {
    let mut harness = Harness::start(FakeFactory::ready().failing_on("http://x/bad.mp3"));

    play(&harness, "a", "http://x/bad.mp3").await;

    let event = harness.next_event().await;
    assert!(matches!(event.kind, PlayerEventKind::Error(ref msg) if msg.contains("bad.mp3")));
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Failed));
    assert!(!harness.session.is_active());

    // No retry until a new source is set.
    harness
        .controller
        .invoke("resume", json!({ "playerId": "a" }))
        .await
        .unwrap();
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Failed));

    play(&harness, "a", "http://x/good.mp3").await;
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));
}

#[tokio::test(start_paused = true)]
async fn engine_failure_while_playing() {
    let mut harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;

    harness.factory.last().fail("decoder crashed");

    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::Duration(5000)
    );
    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::Error("decoder crashed".into())
    );
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Failed));
    assert!(!harness.session.is_active());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(pending_kinds(&mut harness).is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_playback_rate_is_rejected() {
    let harness = Harness::start(FakeFactory::ready());

    let reply = harness
        .controller
        .invoke("setPlaybackRate", json!({ "playerId": "a", "playbackRate": 0 }))
        .await;
    assert!(matches!(
        reply,
        Err(PlaybackError::InvalidArgument {
            name: "playbackRate",
            ..
        })
    ));
    assert!(harness.controller.snapshot().await.unwrap().session("a").is_none());
}

// ============================================================================
// Call Validation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn missing_player_id_fails_without_side_effects() {
    let mut harness = Harness::start(FakeFactory::ready());

    let reply = harness
        .controller
        .invoke("play", json!({ "url": "http://x/1.mp3" }))
        .await;

    assert_eq!(reply, Err(PlaybackError::MissingParameter("playerId")));
    assert!(harness.controller.snapshot().await.unwrap().sessions.is_empty());
    assert_eq!(harness.factory.opened(), 0);
    assert!(pending_kinds(&mut harness).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_methods_and_missing_capabilities_are_not_implemented() {
    let harness = Harness::start(FakeFactory::ready());

    let reply = harness
        .controller
        .invoke("shuffle", json!({ "playerId": "a" }))
        .await;
    assert_eq!(reply, Err(PlaybackError::NotImplemented("shuffle".into())));

    let reply = harness
        .controller
        .invoke("startHeadlessService", json!({ "playerId": "a", "handleKey": [1] }))
        .await;
    assert!(reply.unwrap_err().is_not_implemented());

    assert!(harness.controller.snapshot().await.unwrap().sessions.is_empty());
}

// ============================================================================
// Deferred setUrl
// ============================================================================

#[tokio::test(start_paused = true)]
async fn set_url_replies_once_ready() {
    let harness = Harness::start(FakeFactory::deferred());

    let controller = harness.controller.clone();
    let pending = tokio::spawn(async move {
        controller
            .invoke("setUrl", json!({ "playerId": "a", "url": "song.mp3" }))
            .await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    harness.settle().await;
    assert!(!pending.is_finished());

    harness.factory.last().make_ready();

    assert_eq!(pending.await.unwrap(), Ok(Reply::Ack));
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Ready));
    assert!(!harness.factory.last().is_playing());
}

#[tokio::test(start_paused = true)]
async fn superseded_set_url_fails() {
    let harness = Harness::start(FakeFactory::deferred());

    let controller = harness.controller.clone();
    let pending = tokio::spawn(async move {
        controller
            .invoke("setUrl", json!({ "playerId": "a", "url": "one.mp3" }))
            .await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    play(&harness, "a", "two.mp3").await;

    assert!(matches!(
        pending.await.unwrap(),
        Err(PlaybackError::Superseded(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn set_url_open_failure_fails_the_call() {
    let mut harness = Harness::start(FakeFactory::ready().failing_on("missing.mp3"));

    let reply = harness
        .controller
        .invoke("setUrl", json!({ "playerId": "a", "url": "missing.mp3" }))
        .await;

    assert!(matches!(reply, Err(PlaybackError::Engine(_))));
    assert!(matches!(
        harness.next_event().await.kind,
        PlayerEventKind::Error(_)
    ));
}

// ============================================================================
// Now Playing & Remote Controls
// ============================================================================

#[tokio::test(start_paused = true)]
async fn notification_metadata_tracks_playback() {
    let harness = Harness::start(FakeFactory::ready());

    harness
        .controller
        .invoke(
            "setNotification",
            json!({
                "playerId": "a",
                "title": "Song",
                "artist": "Band",
                "duration": 5,
                "forwardSkipInterval": 15,
                "enableNextTrackButton": true,
            }),
        )
        .await
        .unwrap();

    let info = harness.now_playing.info().unwrap();
    assert_eq!(info.title.as_deref(), Some("Song"));
    assert_eq!(info.duration, Some(Duration::from_secs(5)));
    assert_eq!(info.rate, 0.0);
    let commands = harness.now_playing.commands();
    assert_eq!(commands.forward_skip, Duration::from_secs(15));
    assert!(commands.next_track_enabled);
    assert!(!commands.previous_track_enabled);

    play(&harness, "a", "http://x/1.mp3").await;
    assert_eq!(harness.now_playing.info().unwrap().rate, 1.0);

    harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await
        .unwrap();
    assert_eq!(harness.now_playing.info().unwrap().rate, 0.0);

    harness.controller.shutdown().await.unwrap();
    assert!(harness.now_playing.info().is_none());
}

#[tokio::test(start_paused = true)]
async fn remote_commands_target_last_active_session() {
    let mut harness = Harness::start(FakeFactory::ready());

    // Nothing active yet: presses are ignored and create no session.
    assert!(harness.now_playing.press(RemoteCommand::Play));
    harness.settle().await;
    assert!(harness.controller.snapshot().await.unwrap().sessions.is_empty());

    harness
        .controller
        .invoke(
            "setNotification",
            json!({ "playerId": "a", "enableNextTrackButton": true, "forwardSkipInterval": 1 }),
        )
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    play(&harness, "b", "http://x/2.mp3").await;
    harness.settle().await;
    harness.drain();

    assert!(harness.now_playing.press(RemoteCommand::Pause));
    let event = harness.next_non_tick().await;
    assert_eq!(event.player_id, "b");
    assert_eq!(event.kind, PlayerEventKind::NotificationPlayerStateChanged(false));
    assert_eq!(status(&harness, "b").await, Some(PlayerStatus::Paused));
    assert_eq!(status(&harness, "a").await, Some(PlayerStatus::Playing));

    assert!(harness.now_playing.press(RemoteCommand::NextTrack));
    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::GotNextTrackCommand
    );
    assert!(!harness.now_playing.press(RemoteCommand::PreviousTrack));

    assert!(harness
        .now_playing
        .press(RemoteCommand::SkipForward(Duration::from_secs(1))));
    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::SeekComplete(true)
    );

    assert!(harness.now_playing.press(RemoteCommand::TogglePlayPause));
    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::NotificationPlayerStateChanged(true)
    );
    assert_eq!(status(&harness, "b").await, Some(PlayerStatus::Playing));
}

#[tokio::test(start_paused = true)]
async fn background_state_events_need_a_running_headless_context() {
    let mut harness = Harness::with_runner(FakeFactory::ready(), FakeRunner::default());

    harness
        .controller
        .invoke(
            "monitorNotificationStateChanges",
            json!({ "playerId": "a", "handleMonitorKey": [7] }),
        )
        .await
        .unwrap();
    play(&harness, "a", "http://x/1.mp3").await;
    harness.settle().await;
    harness.drain();

    harness.now_playing.press(RemoteCommand::Pause);
    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::NotificationPlayerStateChanged(false)
    );
    harness.settle().await;
    assert!(pending_kinds(&mut harness).is_empty());

    let reply = harness
        .controller
        .invoke("startHeadlessService", json!({ "playerId": "a", "handleKey": [42] }))
        .await;
    assert_eq!(reply, Ok(Reply::Ack));
    // The runner starts after the acknowledgement.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(harness.runner.as_ref().unwrap().is_running());

    harness.now_playing.press(RemoteCommand::Play);
    assert_eq!(
        harness.next_non_tick().await.kind,
        PlayerEventKind::NotificationPlayerStateChanged(true)
    );
    let event = harness.next_non_tick().await;
    assert_eq!(
        event.kind,
        PlayerEventKind::NotificationBackgroundPlayerStateChanged {
            is_playing: true,
            update_handle_monitor_key: Some(7),
        }
    );
    assert_eq!(
        event.method_name(),
        "audio.onNotificationBackgroundPlayerStateChanged"
    );
}

#[tokio::test(start_paused = true)]
async fn headless_start_acknowledges_before_the_runner_finishes() {
    let mut harness = Harness::with_runner(FakeFactory::ready(), FakeRunner::failing());

    let reply = harness
        .controller
        .invoke("startHeadlessService", json!({ "playerId": "a", "handle": 1 }))
        .await;
    assert_eq!(reply, Ok(Reply::Ack));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!harness.runner.as_ref().unwrap().is_running());
    assert!(pending_kinds(&mut harness).is_empty());
    assert!(!harness.controller.is_closed());
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_releases_everything() {
    let harness = Harness::start(FakeFactory::ready());
    play(&harness, "a", "http://x/1.mp3").await;
    play(&harness, "b", "http://x/2.mp3").await;
    assert!(harness.session.is_active());

    harness.controller.shutdown().await.unwrap();

    for engine in harness.factory.engines() {
        assert_eq!(engine.observer_count(), 0);
        assert!(!engine.is_playing());
    }
    assert!(!harness.session.is_active());

    let reply = harness
        .controller
        .invoke("pause", json!({ "playerId": "a" }))
        .await;
    assert_eq!(reply, Err(PlaybackError::ControllerClosed));
    assert_eq!(
        harness.controller.shutdown().await,
        Err(PlaybackError::ControllerClosed)
    );
}
