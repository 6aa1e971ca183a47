//! Spec: the context planner includes approved memory only, and is
//! deterministic including its retrieval trace.

use crate::prelude::*;
use ac_core::{
    render_artifact, ArtifactHeader, ArtifactId, ArtifactKind, JobKind, ReviewDecision,
    ReviewOutcome, Role, Sensitivity, Visibility,
};
use ac_engine::{plan_context_for_job, persist_context_plan_for_run, PlanRequest};

fn memory_delta(ws: &SpecWorkspace, project: &ac_core::ProjectId, id: &str, approved: bool) {
    let mut header = ArtifactHeader {
        id: ArtifactId::new(id),
        kind: ArtifactKind::MemoryDelta,
        title: format!("remember {id}"),
        visibility: Visibility::Team,
        produced_by: ac_core::AgentId::new("agent_w"),
        run_id: None,
        context_pack_id: None,
        sensitivity: Sensitivity::Normal,
        created_at: Some("2026-01-01T00:00:00Z".to_string()),
        target_file: Some(format!("work/projects/{project}/memory.md")),
        review: vec![],
    };
    if approved {
        header.review.push(ReviewDecision {
            decision: ReviewOutcome::Approved,
            reviewer: "agent_m".to_string(),
            at: "2026-01-02T00:00:00Z".to_string(),
        });
    }
    std::fs::create_dir_all(ws.paths.artifacts_dir(project)).unwrap();
    std::fs::write(
        ws.paths.artifact_path(project, id),
        render_artifact(&header, "## Summary\nship on tuesdays\n").unwrap(),
    )
    .unwrap();
}

fn request(project: &ac_core::ProjectId) -> PlanRequest {
    PlanRequest {
        project_id: project.clone(),
        worker_agent_id: Some(ac_core::AgentId::new("agent_w")),
        manager_actor_id: "agent_m".to_string(),
        manager_role: Role::Manager,
        manager_team_id: None,
        job_kind: JobKind::Execution,
        goal: "continue the project".to_string(),
        constraints: vec![],
        deliverables: vec![],
        context_refs: vec![],
        max_refs: 32,
    }
}

#[tokio::test]
async fn approved_memory_only_and_deterministic() {
    let ws = workspace("Acme");
    ws.add_worker("agent_w", None, "claude");
    let project = ws.add_project("proj_main");

    memory_delta(&ws, &project, "art_approved", true);
    memory_delta(&ws, &project, "art_pending", false);

    let plan = plan_context_for_job(&ws.paths, &request(&project)).unwrap();
    let ids: Vec<&str> = plan
        .context_refs
        .iter()
        .map(|r| r.source_id.as_str())
        .collect();
    assert!(ids.contains(&"art_approved"));
    assert!(!ids.contains(&"art_pending"));

    // Re-running over identical state yields identical refs AND trace
    let again = plan_context_for_job(&ws.paths, &request(&project)).unwrap();
    assert_eq!(plan.context_refs, again.context_refs);
    assert_eq!(plan.retrieval_trace, again.retrieval_trace);

    // Persisting twice yields the same content identity
    let ctx_id = ac_core::ContextPackId::new("ctx_spec");
    let first = persist_context_plan_for_run(
        ws.runtime.store(),
        &ws.paths,
        &project,
        &ctx_id,
        &plan,
    )
    .await
    .unwrap();
    let second = persist_context_plan_for_run(
        ws.runtime.store(),
        &ws.paths,
        &project,
        &ctx_id,
        &again,
    )
    .await
    .unwrap();
    assert_eq!(first, second);

    // The plan landed at the canonical bundle path
    assert!(ws.paths.context_plan_path(&project, &ctx_id).is_file());
}
