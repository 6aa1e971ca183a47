//! Spec: heartbeat auto-actions respect the hourly rate limit — the
//! first low-risk action executes, the second queues a proposal.

use crate::prelude::*;
use ac_core::{
    ActionKind, ActionRisk, HeartbeatConfig, HeartbeatReport, IdempotencyOutcome, JobSpec,
    WorkerAction,
};
use ac_engine::{EngineError, HeartbeatJobRunner, HeartbeatScheduler};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Worker stand-in returning a scripted report once, then OK.
struct ScriptedWorker {
    reports: Mutex<Vec<HeartbeatReport>>,
}

#[async_trait]
impl HeartbeatJobRunner for ScriptedWorker {
    async fn run_heartbeat_job(
        &self,
        _workspace: &Path,
        _job: JobSpec,
        _prompt: String,
        _timeout: Duration,
    ) -> Result<HeartbeatReport, EngineError> {
        let mut reports = self.reports.lock();
        if reports.is_empty() {
            Ok(HeartbeatReport::Ok {
                token: "HEARTBEAT_OK".to_string(),
                summary: "quiet".to_string(),
            })
        } else {
            Ok(reports.remove(0))
        }
    }

    async fn launch_execution_job(
        &self,
        _workspace: &Path,
        _job: JobSpec,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

fn comment(key: &str) -> WorkerAction {
    WorkerAction {
        kind: ActionKind::AddComment,
        idempotency_key: key.to_string(),
        risk: ActionRisk::Low,
        needs_approval: false,
        summary: Some(format!("note {key}")),
        goal: None,
        project_id: None,
        comment: Some("status update".to_string()),
        target: None,
    }
}

#[tokio::test]
async fn hourly_limit_executes_one_queues_one() {
    let ws = workspace("Acme");
    ws.add_worker("agent_w", None, "claude");
    let project = ws.add_project("proj_main");

    // An overdue task so triage wakes the worker
    let tasks = ws.paths.project_dir(&project).join("tasks");
    std::fs::create_dir_all(&tasks).unwrap();
    std::fs::write(
        tasks.join("task_1.md"),
        "---\nassigned_to: agent_w\ndue: 2020-01-01\nstatus: open\n---\n## Summary\nfollow up\n",
    )
    .unwrap();

    let config = HeartbeatConfig {
        enabled: true,
        min_wake_score: 1,
        max_auto_actions_per_hour: 1,
        ..HeartbeatConfig::default()
    };
    ws.runtime
        .heartbeat_store()
        .save_config(&ws.paths, &config)
        .await
        .unwrap();

    let worker_stub = Arc::new(ScriptedWorker {
        reports: Mutex::new(vec![HeartbeatReport::Actions {
            actions: vec![comment("note-1"), comment("note-2")],
        }]),
    });
    let scheduler = HeartbeatScheduler::new(
        ac_core::SystemClock,
        ws.runtime.store().clone(),
        ws.runtime.heartbeat_store().clone(),
        ws.runtime.event_log().clone(),
        worker_stub,
    );

    let summary = scheduler.tick(ws.root(), false).await.unwrap();
    assert_eq!(summary.woken.len(), 1);
    assert_eq!(summary.action_outcomes.len(), 2);

    // First action executed, second queued with a proposal artifact
    assert_eq!(
        summary.action_outcomes[0].1,
        ac_engine::heartbeat::actions::ActionOutcome::Executed
    );
    let ac_engine::heartbeat::actions::ActionOutcome::QueuedForApproval { artifact_id } =
        &summary.action_outcomes[1].1
    else {
        panic!("second action must queue for approval");
    };

    let proposal_path = ws.paths.artifact_path(&project, artifact_id.as_str());
    let text = std::fs::read_to_string(&proposal_path).unwrap();
    let (header, _) = ac_core::parse_artifact(&text).unwrap();
    assert_eq!(header.kind, ac_core::ArtifactKind::HeartbeatActionProposal);

    // The heartbeat stream records the tick and both action outcomes
    let stream = ws.paths.heartbeat_events_path();
    let envelopes = ac_storage::read_envelopes(&stream);
    let types: Vec<&str> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"heartbeat.tick"));
    assert!(types.contains(&"heartbeat.action.executed"));
    assert!(types.contains(&"heartbeat.action.queued"));
    assert!(ac_storage::verify_chain(&stream).chain_intact);

    // Idempotency recorded: executed for the first, queued for the second
    let state = ws.runtime.heartbeat_store().load_state(&ws.paths).unwrap();
    assert_eq!(
        state.idempotency.get("note-1").unwrap().outcome,
        IdempotencyOutcome::Executed
    );
    assert_eq!(
        state.idempotency.get("note-2").unwrap().outcome,
        IdempotencyOutcome::Queued
    );

    // Re-applying a recorded key dedupes with no other effect
    let worker_again = Arc::new(ScriptedWorker {
        reports: Mutex::new(vec![HeartbeatReport::Actions {
            actions: vec![comment("note-1")],
        }]),
    });
    let scheduler = HeartbeatScheduler::new(
        ac_core::SystemClock,
        ws.runtime.store().clone(),
        ws.runtime.heartbeat_store().clone(),
        ws.runtime.event_log().clone(),
        worker_again,
    );
    // New inbox signal so the context hash changes and the worker re-wakes
    std::fs::write(
        ws.root().join("inbox/comments/c1.yaml"),
        "target_agent_id: agent_w\ncreated_at: \"2099-01-01T00:00:00Z\"\ntext: again\n",
    )
    .unwrap();
    let deduped_before = state.stats.actions_deduped;
    let summary = scheduler.tick(ws.root(), false).await.unwrap();
    assert_eq!(
        summary.action_outcomes[0].1,
        ac_engine::heartbeat::actions::ActionOutcome::Deduped
    );
    let state = ws.runtime.heartbeat_store().load_state(&ws.paths).unwrap();
    assert_eq!(state.stats.actions_deduped, deduped_before + 1);
}
