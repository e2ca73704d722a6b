//! Session state: counters, history discipline, position visibility.

use std::time::{Duration, Instant};

use geofacts::models::{ChatId, Position, SessionState, UserId};

fn state(history_cap: usize) -> SessionState {
    SessionState::new(
        UserId(7),
        ChatId(8),
        Position::new(48.8566, 2.3522),
        Duration::from_secs(3600),
        Duration::from_secs(300),
        history_cap,
    )
}

#[test]
fn fact_numbers_are_one_based_and_contiguous() {
    let state = state(10);
    assert_eq!(state.fact_count(), 0);
    assert_eq!(state.next_fact_number(), 1);
    assert_eq!(state.next_fact_number(), 2);
    assert_eq!(state.next_fact_number(), 3);
    assert_eq!(state.fact_count(), 3);
}

#[test]
fn history_is_capped_dropping_the_oldest() {
    let state = state(3);
    for n in 1..=5 {
        state.push_history(format!("entry {n}"));
    }
    assert_eq!(state.history_len(), 3);
    assert_eq!(
        state.exclusions(10),
        vec![
            "entry 3".to_owned(),
            "entry 4".to_owned(),
            "entry 5".to_owned()
        ]
    );
}

#[test]
fn exclusions_return_the_most_recent_window_in_order() {
    let state = state(10);
    for n in 1..=7 {
        state.push_history(format!("entry {n}"));
    }
    let window = state.exclusions(5);
    assert_eq!(window.len(), 5);
    assert_eq!(window.first().map(String::as_str), Some("entry 3"));
    assert_eq!(window.last().map(String::as_str), Some("entry 7"));
}

#[test]
fn exclusions_on_a_fresh_session_are_empty() {
    let state = state(10);
    assert!(state.exclusions(5).is_empty());
}

#[test]
fn recording_a_position_refreshes_the_update_age() {
    let state = state(10);
    std::thread::sleep(Duration::from_millis(30));
    assert!(state.last_update_age() >= Duration::from_millis(25));

    let moved = Position::new(48.8600, 2.3400);
    state.record_position(moved);
    assert!(state.last_update_age() < Duration::from_millis(25));
    assert!((state.position().latitude - moved.latitude).abs() < 1e-9);
    assert!((state.position().longitude - moved.longitude).abs() < 1e-9);
}

#[test]
fn expiry_tracks_the_requested_duration() {
    let state = SessionState::new(
        UserId(7),
        ChatId(8),
        Position::new(0.0, 0.0),
        Duration::from_millis(50),
        Duration::from_secs(300),
        10,
    );
    assert!(!state.is_expired(Instant::now()));
    assert!(state.is_expired(Instant::now() + Duration::from_millis(60)));
    assert_eq!(state.expiry_deadline(), state.started + Duration::from_millis(50));
}

#[test]
fn snapshot_serializes_with_stable_fields() {
    let state = state(10);
    state.push_history("Louvre: largest museum".into());
    let _ = state.next_fact_number();

    let snapshot = state.snapshot();
    assert_eq!(snapshot.user_id, UserId(7));
    assert_eq!(snapshot.fact_count, 1);
    assert_eq!(snapshot.history_len, 1);

    let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
    assert_eq!(json["tracking_duration_seconds"], 3600);
    assert_eq!(json["delivery_interval_seconds"], 300);
    assert_eq!(json["fact_count"], 1);
    assert!(json["session_id"].is_string());
}

#[test]
fn identifiers_and_positions_render_for_logs() {
    assert_eq!(UserId(42).to_string(), "42");
    assert_eq!(ChatId(-7).to_string(), "-7");
    assert_eq!(
        Position::new(48.8566, 2.3522).to_string(),
        "48.856600, 2.352200"
    );
}
