//! Spec: every events file folds into a verifiable hash chain, across
//! restarts and concurrent appends.

use crate::prelude::*;
use ac_core::EventDraft;
use ac_storage::verify_chain;

#[tokio::test]
async fn chain_verifies_across_a_restart() {
    let ws = workspace("Acme");
    let project = ws.add_project("proj_main");
    let run_id = ac_core::RunId::new("run_1");
    let session = ws.session_ref("run_1");
    let events = ws.paths.events_path(&project, &run_id);

    ws.runtime
        .event_log()
        .append(&events, &run_id, &session, EventDraft::run_started("cmd", "agent_w"))
        .await
        .unwrap();

    // Restart: caches dropped, chain must reload from disk
    ws.runtime.reset_for_tests();

    ws.runtime
        .event_log()
        .append(&events, &run_id, &session, EventDraft::run_ended(0))
        .await
        .unwrap();

    let report = verify_chain(&events);
    assert!(report.chain_intact, "{report:?}");
    assert_eq!(report.valid_events, 2);
}

#[tokio::test]
async fn concurrent_appends_keep_total_order() {
    let ws = workspace("Acme");
    let project = ws.add_project("proj_main");
    let run_id = ac_core::RunId::new("run_1");
    let session = ws.session_ref("run_1");
    let events = ws.paths.events_path(&project, &run_id);

    let mut handles = Vec::new();
    for i in 0..16 {
        let log = ws.runtime.event_log().clone();
        let events = events.clone();
        let run_id = run_id.clone();
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            log.append(
                &events,
                &run_id,
                &session,
                EventDraft::new("spec.concurrent", serde_json::json!({ "i": i })),
            )
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let report = verify_chain(&events);
    assert!(report.chain_intact, "{report:?}");
    assert_eq!(report.valid_events, 16);
    assert_eq!(report.parse_errors, 0);
}
