// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ac_core::{
    render_artifact, ArtifactHeader, ArtifactId, ReviewDecision, ReviewOutcome, RunId, Visibility,
};
use ac_storage::init_workspace;

fn workspace() -> (tempfile::TempDir, WorkspacePaths, ProjectId) {
    let dir = tempfile::tempdir().unwrap();
    let paths = init_workspace(dir.path(), "Acme").unwrap();
    let project = ProjectId::new("proj_p");
    std::fs::create_dir_all(paths.project_dir(&project)).unwrap();
    std::fs::write(paths.project_yaml(&project), "id: proj_p\nname: demo\n").unwrap();
    std::fs::write(paths.project_memory(&project), "# Memory\n").unwrap();
    std::fs::write(paths.agents_md(), "# Agents\n").unwrap();

    // The worker agent with its base files
    let agent_dir = paths.agent_dir(&AgentId::new("agent_w"));
    std::fs::create_dir_all(&agent_dir).unwrap();
    std::fs::write(agent_dir.join("agent.yaml"), "role: worker\nteam_id: team_a\n").unwrap();
    std::fs::write(agent_dir.join("AGENTS.md"), "# Worker\n").unwrap();
    std::fs::write(agent_dir.join("role.md"), "do work\n").unwrap();

    (dir, paths, project)
}

fn request(project: &ProjectId) -> PlanRequest {
    PlanRequest {
        project_id: project.clone(),
        worker_agent_id: Some(AgentId::new("agent_w")),
        manager_actor_id: "agent_m".to_string(),
        manager_role: Role::Manager,
        manager_team_id: None,
        job_kind: JobKind::Execution,
        goal: "ship it".to_string(),
        constraints: vec![],
        deliverables: vec![],
        context_refs: vec![],
        max_refs: 32,
    }
}

fn memory_delta(
    paths: &WorkspacePaths,
    project: &ProjectId,
    id: &str,
    approved: Option<bool>,
    body: &str,
) {
    let mut header = ArtifactHeader {
        id: ArtifactId::new(id),
        kind: ac_core::ArtifactKind::MemoryDelta,
        title: format!("delta {id}"),
        visibility: Visibility::Team,
        produced_by: AgentId::new("agent_w"),
        run_id: None,
        context_pack_id: None,
        sensitivity: ac_core::Sensitivity::Normal,
        created_at: Some("2026-01-01T00:00:00Z".to_string()),
        target_file: Some("work/projects/proj_p/memory.md".to_string()),
        review: vec![],
    };
    if let Some(approved) = approved {
        header.review.push(ReviewDecision {
            decision: if approved {
                ReviewOutcome::Approved
            } else {
                ReviewOutcome::Rejected
            },
            reviewer: "agent_m".to_string(),
            at: "2026-01-02T00:00:00Z".to_string(),
        });
    }
    let text = render_artifact(&header, body).unwrap();
    std::fs::create_dir_all(paths.artifacts_dir(project)).unwrap();
    std::fs::write(paths.artifact_path(project, id), text).unwrap();
}

#[test]
fn base_files_form_layer_zero() {
    let (_dir, paths, project) = workspace();
    let plan = plan_context_for_job(&paths, &request(&project)).unwrap();

    let ids: Vec<&str> = plan.context_refs.iter().map(|r| r.source_id.as_str()).collect();
    assert!(ids.contains(&"AGENTS.md"));
    assert!(ids.contains(&"company/company.yaml"));
    assert!(ids.contains(&"work/projects/proj_p/memory.md"));
    assert!(ids.contains(&"org/agents/agent_w/agent.yaml"));
    assert!(plan.layers_used.contains(&0));
}

#[test]
fn only_approved_memory_is_included() {
    let (_dir, paths, project) = workspace();
    memory_delta(&paths, &project, "art_approved", Some(true), "## Summary\nuseful\n");
    memory_delta(&paths, &project, "art_pending", None, "## Summary\npending\n");
    memory_delta(&paths, &project, "art_rejected", Some(false), "## Summary\nno\n");

    let plan = plan_context_for_job(&paths, &request(&project)).unwrap();
    let ids: Vec<&str> = plan.context_refs.iter().map(|r| r.source_id.as_str()).collect();
    assert!(ids.contains(&"art_approved"));
    assert!(!ids.contains(&"art_pending"));
    assert!(!ids.contains(&"art_rejected"));
}

#[test]
fn planning_is_deterministic() {
    let (_dir, paths, project) = workspace();
    memory_delta(&paths, &project, "art_a", Some(true), "## Summary\na\n");
    memory_delta(&paths, &project, "art_b", Some(true), "## Summary\nb\n");

    let first = plan_context_for_job(&paths, &request(&project)).unwrap();
    let second = plan_context_for_job(&paths, &request(&project)).unwrap();
    assert_eq!(first, second, "identical inputs must produce identical plans");
    assert_eq!(first.retrieval_trace, second.retrieval_trace);
}

#[test]
fn secrets_filter_refs_out() {
    let (_dir, paths, project) = workspace();
    memory_delta(
        &paths,
        &project,
        "art_leaky",
        Some(true),
        "## Summary\nuse api_key = verysecretvalue99\n",
    );

    let plan = plan_context_for_job(&paths, &request(&project)).unwrap();
    let ids: Vec<&str> = plan.context_refs.iter().map(|r| r.source_id.as_str()).collect();
    assert!(!ids.contains(&"art_leaky"));
    assert_eq!(plan.filtered_by_secret_count, 1);
    assert!(plan
        .retrieval_trace
        .iter()
        .any(|t| t.contains("art_leaky") && t.contains("secret")));
}

#[test]
fn restricted_memory_from_another_team_is_sensitivity_filtered() {
    let (_dir, paths, project) = workspace();
    // Producer on team_b, restricted
    let producer_dir = paths.agent_dir(&AgentId::new("agent_x"));
    std::fs::create_dir_all(&producer_dir).unwrap();
    std::fs::write(producer_dir.join("agent.yaml"), "role: worker\nteam_id: team_b\n").unwrap();

    let header = ArtifactHeader {
        id: ArtifactId::new("art_restricted"),
        kind: ac_core::ArtifactKind::MemoryDelta,
        title: "restricted".to_string(),
        visibility: Visibility::Team,
        produced_by: AgentId::new("agent_x"),
        run_id: None,
        context_pack_id: None,
        sensitivity: ac_core::Sensitivity::Restricted,
        created_at: Some("2026-01-01T00:00:00Z".to_string()),
        target_file: None,
        review: vec![ReviewDecision {
            decision: ReviewOutcome::Approved,
            reviewer: "agent_m".to_string(),
            at: "2026-01-02T00:00:00Z".to_string(),
        }],
    };
    std::fs::create_dir_all(paths.artifacts_dir(&project)).unwrap();
    std::fs::write(
        paths.artifact_path(&project, "art_restricted"),
        render_artifact(&header, "## Summary\nsecret plans\n").unwrap(),
    )
    .unwrap();

    let plan = plan_context_for_job(&paths, &request(&project)).unwrap();
    let ids: Vec<&str> = plan.context_refs.iter().map(|r| r.source_id.as_str()).collect();
    assert!(!ids.contains(&"art_restricted"));
    assert_eq!(plan.filtered_by_sensitivity_count, 1);
}

#[test]
fn trajectory_runs_join_layer_two() {
    let (_dir, paths, project) = workspace();
    let run_id = RunId::new("run_prior");
    let mut record = ac_core::RunRecord::new(
        run_id.clone(),
        "claude",
        AgentId::new("agent_w"),
        project.clone(),
    );
    record.context_cycles_count = 2;
    let run_dir = paths.run_dir(&project, &run_id);
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(run_dir.join("run.yaml"), serde_yaml::to_string(&record).unwrap()).unwrap();

    let plan = plan_context_for_job(&paths, &request(&project)).unwrap();
    let traj: Vec<&ContextRef> = plan.context_refs.iter().filter(|r| r.layer == 2).collect();
    assert_eq!(traj.len(), 1);
    assert_eq!(traj[0].source_id, "run_prior");
}

#[test]
fn max_refs_caps_the_plan() {
    let (_dir, paths, project) = workspace();
    for i in 0..10 {
        memory_delta(
            &paths,
            &project,
            &format!("art_{i:02}"),
            Some(true),
            "## Summary\nx\n",
        );
    }
    let mut req = request(&project);
    req.max_refs = 5;
    let plan = plan_context_for_job(&paths, &req).unwrap();
    assert_eq!(plan.context_refs.len(), 5);
    // L0 base files take priority over memory
    assert!(plan.context_refs.iter().all(|r| r.layer == 0));
}

#[test]
fn seeds_are_layer_zero() {
    let (_dir, paths, project) = workspace();
    let mut req = request(&project);
    req.context_refs = vec!["work/projects/proj_p/tasks/task_1.md".to_string()];
    let plan = plan_context_for_job(&paths, &req).unwrap();
    let seed = plan
        .context_refs
        .iter()
        .find(|r| r.source_id.contains("task_1"))
        .unwrap();
    assert_eq!(seed.layer, 0);
    assert_eq!(seed.description, "caller seed");
}

#[tokio::test]
async fn persisted_plan_hash_is_content_stable() {
    let (_dir, paths, project) = workspace();
    memory_delta(&paths, &project, "art_a", Some(true), "## Summary\na\n");
    let plan = plan_context_for_job(&paths, &request(&project)).unwrap();

    let store = Store::new();
    let ctx_id = ContextPackId::new("ctx_1");
    let first = persist_context_plan_for_run(&store, &paths, &project, &ctx_id, &plan)
        .await
        .unwrap();
    let second = persist_context_plan_for_run(&store, &paths, &project, &ctx_id, &plan)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 64);

    let on_disk =
        std::fs::read_to_string(paths.context_plan_path(&project, &ctx_id)).unwrap();
    let parsed: ContextPlan = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(parsed, plan);
}
