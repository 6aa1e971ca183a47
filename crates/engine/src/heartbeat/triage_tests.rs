// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ac_storage::init_workspace;

const NOW_MS: u64 = 1_765_000_000_000; // 2025-12-06 UTC

fn workspace() -> (tempfile::TempDir, WorkspacePaths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = init_workspace(dir.path(), "Acme").unwrap();
    (dir, paths)
}

fn add_agent(paths: &WorkspacePaths, id: &str, role: &str) {
    let dir = paths.root().join("org/agents").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("agent.yaml"), format!("role: {role}\n")).unwrap();
}

fn add_task(paths: &WorkspacePaths, project: &str, name: &str, assigned: &str, due: &str) {
    let dir = paths.root().join("work/projects").join(project).join("tasks");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{name}.md")),
        format!("---\nassigned_to: {assigned}\ndue: {due}\nstatus: open\n---\n## Summary\n"),
    )
    .unwrap();
}

fn add_comment_signal(paths: &WorkspacePaths, target: &str, created_at: &str) {
    let dir = paths.root().join("inbox/comments");
    std::fs::create_dir_all(&dir).unwrap();
    let name = format!("c_{}.yaml", uuid::Uuid::new_v4().simple());
    std::fs::write(
        dir.join(name),
        format!("target_agent_id: {target}\ncreated_at: \"{created_at}\"\ntext: ping\n"),
    )
    .unwrap();
}

fn config() -> HeartbeatConfig {
    HeartbeatConfig {
        enabled: true,
        min_wake_score: 1,
        top_k_workers: 3,
        ..HeartbeatConfig::default()
    }
}

#[test]
fn overdue_tasks_score_higher_than_due() {
    let due = WorkerSignals {
        due_tasks: 1,
        ..WorkerSignals::default()
    };
    let overdue = WorkerSignals {
        overdue_tasks: 1,
        ..WorkerSignals::default()
    };
    assert!(overdue.score() > due.score());
}

#[test]
fn workers_with_overdue_tasks_are_selected() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_w", "worker");
    add_task(&paths, "proj_p", "task_1", "agent_w", "2025-11-01");

    let now_iso = iso_from_epoch_ms(NOW_MS);
    let selected = triage(&paths, &config(), &HeartbeatState::default(), &now_iso, NOW_MS);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].agent_id.as_str(), "agent_w");
    assert_eq!(selected[0].signals.overdue_tasks, 1);
    assert_eq!(selected[0].project_id, Some(ProjectId::new("proj_p")));
}

#[test]
fn managers_are_not_woken() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_m", "manager");
    add_task(&paths, "proj_p", "task_1", "agent_m", "2025-11-01");

    let now_iso = iso_from_epoch_ms(NOW_MS);
    let selected = triage(&paths, &config(), &HeartbeatState::default(), &now_iso, NOW_MS);
    assert!(selected.is_empty());
}

#[test]
fn quiet_workers_fall_below_min_score() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_w", "worker");

    let now_iso = iso_from_epoch_ms(NOW_MS);
    let selected = triage(&paths, &config(), &HeartbeatState::default(), &now_iso, NOW_MS);
    assert!(selected.is_empty());
}

#[test]
fn suppressed_workers_are_skipped() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_w", "worker");
    add_task(&paths, "proj_p", "task_1", "agent_w", "2025-11-01");

    let now_iso = iso_from_epoch_ms(NOW_MS);
    let mut state = HeartbeatState::default();
    state.suppression.insert(
        "agent_w".to_string(),
        ac_core::SuppressionEntry {
            suppressed_until: Some("2026-01-01T00:00:00Z".to_string()),
            last_context_hash: None,
        },
    );
    assert!(triage(&paths, &config(), &state, &now_iso, NOW_MS).is_empty());

    // An expired suppression no longer blocks
    state.suppression.get_mut("agent_w").unwrap().suppressed_until =
        Some("2025-01-01T00:00:00Z".to_string());
    assert_eq!(triage(&paths, &config(), &state, &now_iso, NOW_MS).len(), 1);
}

#[test]
fn unchanged_context_hash_is_deduplicated() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_w", "worker");
    add_task(&paths, "proj_p", "task_1", "agent_w", "2025-11-01");

    let now_iso = iso_from_epoch_ms(NOW_MS);
    let first = triage(&paths, &config(), &HeartbeatState::default(), &now_iso, NOW_MS);
    let hash = first[0].context_hash.clone();

    let mut state = HeartbeatState::default();
    state.suppression.insert(
        "agent_w".to_string(),
        ac_core::SuppressionEntry {
            suppressed_until: None,
            last_context_hash: Some(hash),
        },
    );
    assert!(
        triage(&paths, &config(), &state, &now_iso, NOW_MS).is_empty(),
        "same inputs must not re-wake the worker"
    );

    // New signal changes the hash and re-qualifies the worker
    add_comment_signal(&paths, "agent_w", "2025-12-06T00:00:00Z");
    assert_eq!(triage(&paths, &config(), &state, &now_iso, NOW_MS).len(), 1);
}

#[test]
fn top_k_takes_highest_scores_with_stable_ties() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_a", "worker");
    add_agent(&paths, "agent_b", "worker");
    add_agent(&paths, "agent_c", "worker");
    // b has the most pressure, a and c tie
    add_task(&paths, "proj_p", "t1", "agent_b", "2025-11-01");
    add_task(&paths, "proj_p", "t2", "agent_b", "2025-11-02");
    add_task(&paths, "proj_p", "t3", "agent_a", "2025-11-01");
    add_task(&paths, "proj_p", "t4", "agent_c", "2025-11-01");

    let mut cfg = config();
    cfg.top_k_workers = 2;
    let now_iso = iso_from_epoch_ms(NOW_MS);
    let selected = triage(&paths, &cfg, &HeartbeatState::default(), &now_iso, NOW_MS);
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0].agent_id.as_str(), "agent_b");
    // Tie between a and c resolves by id
    assert_eq!(selected[1].agent_id.as_str(), "agent_a");
}

#[test]
fn context_hash_distinguishes_large_counts() {
    // 256 vs 0 must not collide (no byte truncation)
    let a = hash_context(
        &AgentId::new("agent_w"),
        &WorkerSignals {
            overdue_tasks: 256,
            ..WorkerSignals::default()
        },
    );
    let b = hash_context(&AgentId::new("agent_w"), &WorkerSignals::default());
    assert_ne!(a, b);
}

#[test]
fn old_inbox_signals_do_not_count_as_new() {
    let (_dir, paths) = workspace();
    add_agent(&paths, "agent_w", "worker");
    add_comment_signal(&paths, "agent_w", "2025-01-01T00:00:00Z");

    let mut state = HeartbeatState::default();
    state.last_tick_at = Some("2025-06-01T00:00:00Z".to_string());

    let now_iso = iso_from_epoch_ms(NOW_MS);
    let selected = triage(&paths, &config(), &state, &now_iso, NOW_MS);
    assert!(selected.is_empty(), "stale signals must not wake anyone");
}
