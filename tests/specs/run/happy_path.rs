//! Spec: a clean run ends with exit 0, captured stdout, and a verifiable
//! event trail.

use crate::prelude::*;
use ac_core::RunStatus;
use std::time::Duration;

#[tokio::test]
async fn happy_path_run() {
    let ws = workspace("Acme");
    ws.add_team("team_payments");
    let worker = ws.add_worker("agent_w", Some("team_payments"), "cmd");
    let project = ws.add_project("proj_main");

    let session_ref = ws
        .runtime
        .sessions()
        .launch_session(ws.launch_spec(
            &project,
            "run_r1",
            &worker,
            &["sh", "-c", "printf 'hello\\n'"],
        ))
        .await
        .unwrap();

    let poll = ws
        .runtime
        .sessions()
        .wait_terminal(&ws.paths, &session_ref, Duration::from_secs(15))
        .await
        .unwrap();
    assert_eq!(poll.status, RunStatus::Ended);
    assert_eq!(poll.exit_code, Some(0));

    // stdout captured into the run's outputs
    let stdout = std::fs::read_to_string(
        ws.paths
            .outputs_dir(&project, &ac_core::RunId::new("run_r1"))
            .join("stdout.txt"),
    )
    .unwrap();
    assert!(stdout.contains("hello"));

    // run.yaml reflects the terminal status
    assert_eq!(ws.run_record(&project, "run_r1").status, RunStatus::Ended);

    // events.jsonl holds run.started then run.ended
    let types: Vec<String> = ws
        .events_of(&project, "run_r1")
        .iter()
        .map(|e| e.event_type.clone())
        .collect();
    let started = types.iter().position(|t| t == "run.started").unwrap();
    let ended = types.iter().position(|t| t == "run.ended").unwrap();
    assert!(started < ended);
}

#[tokio::test]
async fn snapshot_sees_the_finished_run() {
    let ws = workspace("Acme");
    let worker = ws.add_worker("agent_w", None, "cmd");
    let project = ws.add_project("proj_main");

    let session_ref = ws
        .runtime
        .sessions()
        .launch_session(ws.launch_spec(&project, "run_r1", &worker, &["sh", "-c", "true"]))
        .await
        .unwrap();
    ws.runtime
        .sessions()
        .wait_terminal(&ws.paths, &session_ref, Duration::from_secs(15))
        .await
        .unwrap();

    let rows = ac_engine::run_rows(&ws.paths, ws.runtime.sessions());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, RunStatus::Ended);
    assert_eq!(rows[0].last_event_type.as_deref(), Some("run.ended"));
    assert_eq!(rows[0].parse_error_count, 0);
}
