//! Spec: a cross-team worker launch is refused at preflight and no child
//! process is ever spawned.

use crate::prelude::*;
use ac_core::{Actor, Role, RunStatus, TeamId};
use ac_engine::{PolicyAction, ResourceCtx, SessionFilter};

#[tokio::test]
async fn cross_team_launch_is_denied_preflight() {
    let ws = workspace("Acme");
    ws.add_team("team_a");
    ws.add_team("team_b");
    let worker = ws.add_worker("agent_w", Some("team_a"), "cmd");
    let project = ws.add_project("proj_main");

    let mut spec = ws.launch_spec(&project, "run_x", &worker, &["sh", "-c", "echo nope"]);
    spec.actor = Some(Actor::new("agent_m", Role::Manager).with_team(TeamId::new("team_b")));
    spec.gates.policy = Some((
        PolicyAction::LaunchWorker,
        ResourceCtx {
            worker_team: Some(TeamId::new("team_a")),
            target_team: Some(TeamId::new("team_b")),
            ..ResourceCtx::default()
        },
    ));

    let err = ws.runtime.sessions().launch_session(spec).await.unwrap_err();
    assert_eq!(err.code(), "policy_denied");

    // run.yaml failed, events carry policy.denied then run.failed{preflight}
    assert_eq!(ws.run_record(&project, "run_x").status, RunStatus::Failed);
    let events = ws.events_of(&project, "run_x");
    let denied_at = events
        .iter()
        .position(|e| e.event_type == "policy.denied")
        .unwrap();
    let failed_at = events
        .iter()
        .position(|e| e.event_type == "run.failed")
        .unwrap();
    assert!(denied_at < failed_at);
    assert_eq!(events[failed_at].payload["preflight"], true);
    assert_eq!(events[failed_at].payload["reason"], "policy_denied");

    // No child process: no session record, no outputs
    assert!(ws
        .runtime
        .sessions()
        .list_sessions(&ws.paths, &SessionFilter::default())
        .is_empty());
    assert!(!ws
        .paths
        .outputs_dir(&project, &ac_core::RunId::new("run_x"))
        .join("stdout.txt")
        .exists());
}
