// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context planner: the ranked, filtered set of references a run is told
//! to consider.
//!
//! Three layers in priority order: L0 deterministic base files, L1
//! approved memory deltas, L2 trajectory (digests, failure reports, runs
//! with context cycles). Within a layer higher score wins; ties break by
//! creation time descending, then source id ascending. Two invocations
//! over identical workspace state return identical refs and an identical
//! retrieval trace.

use ac_core::{
    parse_artifact, Actor, AgentId, ArtifactKind, ContextPackId, JobKind, ProjectId, Role, RunRecord,
    Sensitivity, TeamId,
};
use ac_storage::{Store, WorkspacePaths, WriteOpts};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::policy::{enforce_policy, PolicyAction, ResourceCtx};
use crate::secrets;

/// One planned reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    pub source_id: String,
    pub path: String,
    pub layer: u8,
    pub score: u32,
    pub description: String,
}

/// The planner's output; persisted verbatim as `context_plan.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextPlan {
    pub context_refs: Vec<ContextRef>,
    pub layers_used: Vec<u8>,
    pub retrieval_trace: Vec<String>,
    pub filtered_by_policy_count: u32,
    pub filtered_by_sensitivity_count: u32,
    pub filtered_by_secret_count: u32,
}

/// Inputs to one planning pass.
pub struct PlanRequest {
    pub project_id: ProjectId,
    pub worker_agent_id: Option<AgentId>,
    pub manager_actor_id: String,
    pub manager_role: Role,
    pub manager_team_id: Option<TeamId>,
    pub job_kind: JobKind,
    pub goal: String,
    pub constraints: Vec<String>,
    pub deliverables: Vec<String>,
    /// Caller-seeded refs; always included at L0.
    pub context_refs: Vec<String>,
    pub max_refs: usize,
}

/// Plan the context pack for one job.
pub fn plan_context_for_job(
    paths: &WorkspacePaths,
    request: &PlanRequest,
) -> Result<ContextPlan, EngineError> {
    let mut plan = ContextPlan::default();
    let reader = reader_actor(paths, request);

    // -- L0: deterministic base files --
    let mut base_files: Vec<(String, std::path::PathBuf)> = vec![
        ("AGENTS.md".to_string(), paths.agents_md()),
        ("company/company.yaml".to_string(), paths.company_yaml()),
        ("company/policy.yaml".to_string(), paths.policy_yaml()),
        (
            format!("work/projects/{}/memory.md", request.project_id),
            paths.project_memory(&request.project_id),
        ),
    ];
    if let Some(worker) = &request.worker_agent_id {
        let agent_dir = paths.agent_dir(worker);
        for file in [
            "agent.yaml",
            "AGENTS.md",
            "role.md",
            "skills_index.md",
            "context_index.md",
        ] {
            base_files.push((
                format!("org/agents/{worker}/{file}"),
                agent_dir.join(file),
            ));
        }
    }

    for (rel, path) in base_files {
        if path.is_file() {
            plan.retrieval_trace.push(format!("L0 include {rel}"));
            plan.context_refs.push(ContextRef {
                source_id: rel.clone(),
                path: rel,
                layer: 0,
                score: 100,
                description: "base file".to_string(),
            });
        } else {
            plan.retrieval_trace.push(format!("L0 missing {rel}"));
        }
    }
    for seed in &request.context_refs {
        plan.retrieval_trace.push(format!("L0 seed {seed}"));
        plan.context_refs.push(ContextRef {
            source_id: seed.clone(),
            path: seed.clone(),
            layer: 0,
            score: 100,
            description: "caller seed".to_string(),
        });
    }

    // -- L1 + L2: artifacts --
    let artifacts = load_artifacts(paths, &request.project_id);
    let mut layered: Vec<ContextRef> = Vec::new();

    for entry in &artifacts {
        let (layer, score, description) = match entry.header.kind {
            ArtifactKind::MemoryDelta => (1u8, 10u32, "approved memory delta"),
            ArtifactKind::ManagerDigest => (2, 6, "manager digest"),
            ArtifactKind::FailureReport => (2, 5, "failure report"),
            _ => continue,
        };
        if entry.header.kind == ArtifactKind::MemoryDelta && !entry.header.is_approved() {
            plan.retrieval_trace
                .push(format!("L1 skip {} not_approved", entry.header.id));
            continue;
        }

        // Compose policy with the producer's team
        let producer_team = agent_team(paths, &entry.header.produced_by);
        let decision = enforce_policy(
            &reader,
            PolicyAction::ComposeMemory,
            &ResourceCtx {
                visibility: Some(entry.header.visibility),
                sensitivity: Some(entry.header.sensitivity),
                producer_id: Some(entry.header.produced_by.to_string()),
                producer_team,
                ..ResourceCtx::default()
            },
        );
        if !decision.allowed {
            if entry.header.sensitivity == Sensitivity::Restricted {
                plan.filtered_by_sensitivity_count += 1;
                plan.retrieval_trace
                    .push(format!("L{layer} filter {} sensitivity", entry.header.id));
            } else {
                plan.filtered_by_policy_count += 1;
                plan.retrieval_trace
                    .push(format!("L{layer} filter {} policy", entry.header.id));
            }
            continue;
        }

        // Secret scan over the displayed surface
        let surface = format!("{}\n{}", entry.header.title, entry.body);
        if secrets::contains_secret(&surface) {
            plan.filtered_by_secret_count += 1;
            plan.retrieval_trace
                .push(format!("L{layer} filter {} secret", entry.header.id));
            continue;
        }

        plan.retrieval_trace
            .push(format!("L{layer} include {} score={score}", entry.header.id));
        layered.push(ContextRef {
            source_id: entry.header.id.to_string(),
            path: format!(
                "work/projects/{}/artifacts/{}.md",
                request.project_id, entry.header.id
            ),
            layer,
            score,
            description: format!("{description}: {}", entry.header.title),
        });
    }

    // -- L2: runs with context cycles --
    for run in load_trajectory_runs(paths, &request.project_id) {
        plan.retrieval_trace
            .push(format!("L2 include {} score=4", run.id));
        layered.push(ContextRef {
            source_id: run.id.to_string(),
            path: format!("work/projects/{}/runs/{}/run.yaml", request.project_id, run.id),
            layer: 2,
            score: 4,
            description: "prior run trajectory".to_string(),
        });
    }

    // Layer priority, then score desc, then creation desc, then id asc.
    // Creation order is already encoded by the stable artifact sort below.
    layered.sort_by(|a, b| {
        a.layer
            .cmp(&b.layer)
            .then_with(|| b.score.cmp(&a.score))
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    plan.context_refs.extend(layered);
    plan.context_refs.truncate(request.max_refs.max(1));

    let mut layers: Vec<u8> = plan.context_refs.iter().map(|r| r.layer).collect();
    layers.sort_unstable();
    layers.dedup();
    plan.layers_used = layers;

    Ok(plan)
}

/// Persist a plan; its content sha256 becomes the plan identity.
pub async fn persist_context_plan_for_run(
    store: &Store,
    paths: &WorkspacePaths,
    project_id: &ProjectId,
    ctx_id: &ContextPackId,
    plan: &ContextPlan,
) -> Result<String, EngineError> {
    let content = serde_json::to_string_pretty(plan).map_err(ac_storage::StoreError::from)?;
    let path = paths.context_plan_path(project_id, ctx_id);
    store
        .write_atomic(&path, content.as_bytes(), WriteOpts::default())
        .await?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

struct LoadedArtifact {
    header: ac_core::ArtifactHeader,
    body: String,
    created_at: String,
}

/// Artifacts sorted newest-first, id ascending on ties. Unparseable files
/// are skipped (the snapshot builder surfaces those).
fn load_artifacts(paths: &WorkspacePaths, project_id: &ProjectId) -> Vec<LoadedArtifact> {
    let dir = paths.artifacts_dir(project_id);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut artifacts = Vec::new();
    for entry in entries.flatten() {
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok((header, body)) = parse_artifact(&text) else {
            continue;
        };
        artifacts.push(LoadedArtifact {
            created_at: header.created_at.clone().unwrap_or_default(),
            body: body.to_string(),
            header,
        });
    }
    artifacts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.header.id.cmp(&b.header.id))
    });
    artifacts
}

fn load_trajectory_runs(paths: &WorkspacePaths, project_id: &ProjectId) -> Vec<RunRecord> {
    let Ok(entries) = std::fs::read_dir(paths.runs_dir(project_id)) else {
        return Vec::new();
    };
    let mut runs = Vec::new();
    for entry in entries.flatten() {
        let Ok(text) = std::fs::read_to_string(entry.path().join("run.yaml")) else {
            continue;
        };
        let Ok(record) = serde_yaml::from_str::<RunRecord>(&text) else {
            continue;
        };
        if record.context_cycles_count > 0 {
            runs.push(record);
        }
    }
    runs.sort_by(|a, b| a.id.cmp(&b.id));
    runs
}

/// Who reads the pack: the worker when known, else the manager actor.
fn reader_actor(paths: &WorkspacePaths, request: &PlanRequest) -> Actor {
    match &request.worker_agent_id {
        Some(worker) => {
            let mut actor = Actor::new(worker.as_str(), Role::Worker);
            if let Some(team) = agent_team(paths, worker) {
                actor = actor.with_team(team);
            }
            actor
        }
        None => {
            let mut actor = Actor::new(&request.manager_actor_id, request.manager_role);
            if let Some(team) = request.manager_team_id.clone() {
                actor = actor.with_team(team);
            }
            actor
        }
    }
}

#[derive(Deserialize)]
struct AgentTeamYaml {
    #[serde(default)]
    team_id: Option<TeamId>,
}

fn agent_team(paths: &WorkspacePaths, agent_id: &AgentId) -> Option<TeamId> {
    let text = std::fs::read_to_string(paths.agent_yaml(agent_id)).ok()?;
    serde_yaml::from_str::<AgentTeamYaml>(&text).ok()?.team_id
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
