//! Spec: a project already past its hard cost ceiling never spawns
//! another child process.

use crate::prelude::*;
use ac_core::{RunId, RunStatus, RunUsage, UsageConfidence, UsageSource};

fn fabricate_spent_run(ws: &SpecWorkspace, project: &ac_core::ProjectId, cost: f64) {
    let run_id = RunId::new("run_prior");
    let mut record = ac_core::RunRecord::new(
        run_id.clone(),
        "claude",
        ac_core::AgentId::new("agent_w"),
        project.clone(),
    );
    record.status = RunStatus::Ended;
    record.usage = Some(RunUsage {
        source: UsageSource::ProviderReported,
        confidence: UsageConfidence::High,
        input_tokens: 10_000,
        cached_input_tokens: 0,
        output_tokens: 2_000,
        reasoning_output_tokens: 0,
        cost_usd: cost,
        cost_source: "provider".to_string(),
    });
    let dir = ws.paths.run_dir(project, &run_id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("run.yaml"), serde_yaml::to_string(&record).unwrap()).unwrap();
}

#[tokio::test]
async fn budget_preflight_hard_block() {
    let ws = workspace("Acme");
    let worker = ws.add_worker("agent_w", None, "cmd");
    let project = ws.add_project("proj_main");
    std::fs::write(
        ws.paths.project_yaml(&project),
        "id: proj_main\nname: proj\nbudget:\n  hard_cost_usd: 0.01\n",
    )
    .unwrap();
    fabricate_spent_run(&ws, &project, 0.05);

    let mut spec = ws.launch_spec(&project, "run_new", &worker, &["sh", "-c", "echo nope"]);
    spec.gates.budget = true;

    let err = ws.runtime.sessions().launch_session(spec).await.unwrap_err();
    assert_eq!(err.code(), "budget_exceeded");
    assert!(err.to_string().contains("budget preflight blocked launch"));

    let events = ws.events_of(&project, "run_new");
    let exceeded = events
        .iter()
        .find(|e| e.event_type == "budget.exceeded")
        .expect("budget.exceeded event");
    assert_eq!(exceeded.payload["scope"], "project");
    assert_eq!(exceeded.payload["phase"], "preflight");

    let failed = events
        .iter()
        .find(|e| e.event_type == "run.failed")
        .expect("run.failed event");
    assert_eq!(failed.payload["preflight"], true);
    assert_eq!(failed.payload["reason"], "budget_preflight_exceeded");

    // Never spawned
    assert!(!ws
        .paths
        .outputs_dir(&project, &RunId::new("run_new"))
        .join("stdout.txt")
        .exists());
}

#[tokio::test]
async fn under_budget_launch_proceeds_with_decision_event() {
    let ws = workspace("Acme");
    let worker = ws.add_worker("agent_w", None, "cmd");
    let project = ws.add_project("proj_main");
    std::fs::write(
        ws.paths.project_yaml(&project),
        "id: proj_main\nname: proj\nbudget:\n  soft_cost_usd: 5.0\n  hard_cost_usd: 10.0\n",
    )
    .unwrap();
    fabricate_spent_run(&ws, &project, 0.50);

    let mut spec = ws.launch_spec(&project, "run_new", &worker, &["sh", "-c", "true"]);
    spec.gates.budget = true;
    let session_ref = ws.runtime.sessions().launch_session(spec).await.unwrap();
    let poll = ws
        .runtime
        .sessions()
        .wait_terminal(&ws.paths, &session_ref, std::time::Duration::from_secs(15))
        .await
        .unwrap();
    assert_eq!(poll.status, RunStatus::Ended);

    let events = ws.events_of(&project, "run_new");
    let decision = events
        .iter()
        .find(|e| e.event_type == "budget.decision")
        .unwrap();
    assert_eq!(decision.payload["result"], "ok");
}
