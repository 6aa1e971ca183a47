//! Spec: detached sessions survive a control-plane restart; stale pid
//! claims are never signaled.

use crate::prelude::*;
use ac_core::RunStatus;

#[tokio::test]
async fn detached_session_survives_restart_and_stops() {
    let ws = workspace("Acme");
    let worker = ws.add_worker("agent_w", None, "cmd");
    let project = ws.add_project("proj_main");

    ws.runtime
        .sessions()
        .launch_session(ws.launch_spec(&project, "run_long", &worker, &["sleep", "60"]))
        .await
        .unwrap();

    // The control plane "restarts": all in-memory tables flushed
    ws.runtime.reset_for_tests();

    // Stop must still work through the persisted pid
    let session_ref = ws.session_ref("run_long");
    let poll = ws
        .runtime
        .sessions()
        .stop_session(&ws.paths, &session_ref)
        .await
        .unwrap();
    assert_eq!(poll.status, RunStatus::Stopped);
    assert_eq!(ws.run_record(&project, "run_long").status, RunStatus::Stopped);
}

#[tokio::test]
async fn forged_stale_claim_refuses_to_signal() {
    let ws = workspace("Acme");
    let worker = ws.add_worker("agent_w", None, "cmd");
    let project = ws.add_project("proj_main");

    ws.runtime
        .sessions()
        .launch_session(ws.launch_spec(&project, "run_long", &worker, &["sleep", "60"]))
        .await
        .unwrap();
    ws.runtime.reset_for_tests();

    // Forge the pid claim to 31 minutes ago
    let session_ref = ws.session_ref("run_long");
    let record_path = ws.paths.session_record_path(&session_ref);
    let mut record: ac_storage::SessionRecord =
        serde_yaml::from_str(&std::fs::read_to_string(&record_path).unwrap()).unwrap();
    let pid = record.pid.unwrap();
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    record.pid_claimed_at_ms = Some(now_ms - 31 * 60 * 1000);
    std::fs::write(&record_path, serde_yaml::to_string(&record).unwrap()).unwrap();

    let poll = ws
        .runtime
        .sessions()
        .stop_session(&ws.paths, &session_ref)
        .await
        .unwrap();
    assert_eq!(poll.status, RunStatus::Running);
    assert!(poll
        .error
        .unwrap()
        .contains("pid may have been reused"));

    // The process was left untouched; clean it up
    let raw = nix_pid(pid);
    assert!(nix::sys::signal::kill(raw, None).is_ok());
    let _ = nix::sys::signal::kill(raw, nix::sys::signal::Signal::SIGKILL);
}

fn nix_pid(pid: u32) -> nix::unistd::Pid {
    nix::unistd::Pid::from_raw(pid as i32)
}
