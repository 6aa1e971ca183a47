// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    inside = { 22, 6, 23, true },
    wraps_past_midnight = { 22, 6, 3, true },
    outside = { 22, 6, 12, false },
    boundary_start = { 9, 17, 9, true },
    boundary_end = { 9, 17, 17, false },
    empty_window_never_quiet = { 8, 8, 8, false },
)]
fn quiet_hours_contains(start: u8, end: u8, hour: u8, expected: bool) {
    let window = QuietHours {
        start_hour: start,
        end_hour: end,
    };
    assert_eq!(window.contains(hour), expected);
}

#[test]
fn report_parses_ok_variant() {
    let json = serde_json::json!({
        "status": "ok",
        "token": "HEARTBEAT_OK",
        "summary": "nothing to do",
    });
    let report: HeartbeatReport = serde_json::from_value(json).unwrap();
    assert!(matches!(report, HeartbeatReport::Ok { ref token, .. } if token == "HEARTBEAT_OK"));
}

#[test]
fn report_parses_actions_variant() {
    let json = serde_json::json!({
        "status": "actions",
        "actions": [{
            "kind": "add_comment",
            "idempotency_key": "k1",
            "comment": "looks stuck",
        }],
    });
    let report: HeartbeatReport = serde_json::from_value(json).unwrap();
    let HeartbeatReport::Actions { actions } = report else {
        panic!("expected actions variant");
    };
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind, ActionKind::AddComment);
    assert_eq!(actions[0].risk, ActionRisk::Low);
    assert!(!actions[0].needs_approval);
}

#[test]
fn unknown_status_tag_is_rejected() {
    let json = serde_json::json!({ "status": "maybe", "summary": "?" });
    assert!(serde_json::from_value::<HeartbeatReport>(json).is_err());
}

#[test]
fn unknown_action_kind_is_rejected() {
    let json = serde_json::json!({
        "status": "actions",
        "actions": [{ "kind": "rm_rf", "idempotency_key": "k" }],
    });
    assert!(serde_json::from_value::<HeartbeatReport>(json).is_err());
}

#[test]
fn prune_drops_expired_idempotency_and_old_buckets() {
    let mut state = HeartbeatState::default();
    state.idempotency.insert(
        "old".to_string(),
        IdempotencyEntry {
            outcome: IdempotencyOutcome::Executed,
            expires_at: "2026-01-01T00:00:00Z".to_string(),
        },
    );
    state.idempotency.insert(
        "live".to_string(),
        IdempotencyEntry {
            outcome: IdempotencyOutcome::Queued,
            expires_at: "2026-12-31T00:00:00Z".to_string(),
        },
    );
    state
        .hourly_action_counters
        .insert("2026-01-01-00".to_string(), 4);
    state
        .hourly_action_counters
        .insert("2026-06-01-12".to_string(), 1);

    state.prune(
        "2026-06-01T12:30:00Z",
        &["2026-06-01-12".to_string(), "2026-06-01-11".to_string()],
    );

    assert!(state.idempotency.contains_key("live"));
    assert!(!state.idempotency.contains_key("old"));
    assert_eq!(state.hourly_action_counters.len(), 1);
    assert!(state.hourly_action_counters.contains_key("2026-06-01-12"));
}

#[test]
fn config_defaults_are_conservative() {
    let config = HeartbeatConfig::default();
    assert!(!config.enabled);
    assert!(!config.dry_run);
    assert_eq!(config.hierarchy_mode, HierarchyMode::Flat);
}

#[test]
fn state_round_trips_through_yaml() {
    let mut state = HeartbeatState::default();
    state.running = true;
    state.stats.ticks_total = 3;
    state.suppression.insert(
        "agent_w".to_string(),
        SuppressionEntry {
            suppressed_until: Some("2026-06-01T13:00:00Z".to_string()),
            last_context_hash: Some("deadbeef".to_string()),
        },
    );

    let yaml = serde_yaml::to_string(&state).unwrap();
    let back: HeartbeatState = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back, state);
}
