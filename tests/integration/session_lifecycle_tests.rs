//! Registry lifecycle: start, restart-replaces, stop, and shutdown.

use std::time::Duration;

use super::test_helpers::{
    paris, short_policy, test_registry, wait_for, RecordingChannel, ScriptedGenerator, CHAT, USER,
};
use geofacts::models::{Position, UserId};

#[tokio::test]
async fn start_registers_exactly_one_session() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let registry = test_registry(&generator, &channel, short_policy());

    registry
        .start(
            USER,
            CHAT,
            paris(),
            Duration::from_secs(3600),
            Duration::from_secs(300),
        )
        .await
        .unwrap();

    assert!(registry.is_tracking(USER));
    assert_eq!(registry.active_count(), 1);
    assert!(!registry.is_tracking(UserId(999)));

    registry.shutdown_all().await;
}

#[tokio::test]
async fn restart_replaces_session_and_keeps_second_parameters() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let registry = test_registry(&generator, &channel, short_policy());

    registry
        .start(
            USER,
            CHAT,
            paris(),
            Duration::from_secs(3600),
            Duration::from_secs(600),
        )
        .await
        .unwrap();
    let first = registry.snapshot(USER).unwrap();

    // Immediate restart with different parameters must fully replace the
    // first session, never add a second one.
    registry
        .start(
            USER,
            CHAT,
            Position::new(55.7558, 37.6173),
            Duration::from_secs(1800),
            Duration::from_secs(300),
        )
        .await
        .unwrap();

    assert_eq!(registry.active_count(), 1);
    let second = registry.snapshot(USER).unwrap();
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(second.tracking_duration_seconds, 1800);
    assert_eq!(second.delivery_interval_seconds, 300);
    assert!((second.position.latitude - 55.7558).abs() < 1e-9);

    registry.shutdown_all().await;
}

#[tokio::test]
async fn stop_settles_session_and_halts_deliveries() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let mut policy = short_policy();
    policy.floor_sleep = Duration::from_millis(10);
    let registry = test_registry(&generator, &channel, policy);

    registry
        .start(
            USER,
            CHAT,
            paris(),
            Duration::from_secs(3600),
            Duration::from_millis(60),
        )
        .await
        .unwrap();

    registry.stop(USER).await;
    assert!(!registry.is_tracking(USER));
    assert_eq!(registry.active_count(), 0);

    // No delivery may land after stop has settled both tasks.
    let delivered_before = channel.facts().len();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(channel.facts().len(), delivered_before);
    // Explicit stop sends no notification; the caller owns confirmation.
    assert!(channel.events().is_empty());
}

#[tokio::test]
async fn stop_for_unknown_user_is_a_noop() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let registry = test_registry(&generator, &channel, short_policy());

    registry.stop(UserId(42)).await;
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn update_position_for_unknown_user_is_dropped() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let registry = test_registry(&generator, &channel, short_policy());

    registry.update_position(UserId(42), paris());
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn update_position_is_visible_in_snapshot() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let registry = test_registry(&generator, &channel, short_policy());

    registry
        .start(
            USER,
            CHAT,
            paris(),
            Duration::from_secs(3600),
            Duration::from_secs(300),
        )
        .await
        .unwrap();

    registry.update_position(USER, Position::new(48.8600, 2.3400));
    let snapshot = registry.snapshot(USER).unwrap();
    assert!((snapshot.position.latitude - 48.8600).abs() < 1e-9);
    assert!((snapshot.position.longitude - 2.3400).abs() < 1e-9);

    registry.shutdown_all().await;
}

#[tokio::test]
async fn shutdown_all_settles_every_session() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let registry = test_registry(&generator, &channel, short_policy());

    for id in 1..=3 {
        registry
            .start(
                UserId(id),
                CHAT,
                paris(),
                Duration::from_secs(3600),
                Duration::from_secs(300),
            )
            .await
            .unwrap();
    }
    assert_eq!(registry.active_count(), 3);

    registry.shutdown_all().await;
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn self_terminated_session_leaves_no_dangling_entry() {
    let generator = ScriptedGenerator::new();
    let channel = RecordingChannel::new();
    let mut policy = short_policy();
    policy.health_poll = Duration::from_secs(10);
    let registry = test_registry(&generator, &channel, policy);

    // Session expires after a single short lifetime; the delivery loop
    // must remove its own registry entry on the way out.
    registry
        .start(
            USER,
            CHAT,
            paris(),
            Duration::from_millis(120),
            Duration::from_millis(80),
        )
        .await
        .unwrap();

    let registry_view = registry.clone();
    let gone = wait_for(Duration::from_secs(3), move || {
        !registry_view.is_tracking(USER)
    })
    .await;
    assert!(gone, "expired session should retire its registry entry");
}
