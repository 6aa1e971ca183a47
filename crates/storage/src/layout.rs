// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical on-disk layout of a workspace.
//!
//! A workspace is any directory containing `company/company.yaml`. All
//! path construction goes through [`WorkspacePaths`] so the layout is
//! defined in exactly one place.

use ac_core::{AgentId, ContextPackId, ProjectId, RunId, SessionRef, TeamId};
use std::path::{Path, PathBuf};

use crate::atomic::StoreError;

/// Walk upward from `start` until a directory containing
/// `company/company.yaml` is found.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join("company").join("company.yaml").is_file() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Path helpers rooted at one workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn company_yaml(&self) -> PathBuf {
        self.root.join("company/company.yaml")
    }

    pub fn policy_yaml(&self) -> PathBuf {
        self.root.join("company/policy.yaml")
    }

    pub fn agents_md(&self) -> PathBuf {
        self.root.join("AGENTS.md")
    }

    pub fn agent_dir(&self, agent_id: &AgentId) -> PathBuf {
        self.root.join("org/agents").join(agent_id.as_str())
    }

    pub fn agent_yaml(&self, agent_id: &AgentId) -> PathBuf {
        self.agent_dir(agent_id).join("agent.yaml")
    }

    pub fn team_yaml(&self, team_id: &TeamId) -> PathBuf {
        self.root
            .join("org/teams")
            .join(team_id.as_str())
            .join("team.yaml")
    }

    pub fn project_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.root.join("work/projects").join(project_id.as_str())
    }

    pub fn project_yaml(&self, project_id: &ProjectId) -> PathBuf {
        self.project_dir(project_id).join("project.yaml")
    }

    pub fn project_memory(&self, project_id: &ProjectId) -> PathBuf {
        self.project_dir(project_id).join("memory.md")
    }

    pub fn artifacts_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.project_dir(project_id).join("artifacts")
    }

    pub fn artifact_path(&self, project_id: &ProjectId, artifact_id: &str) -> PathBuf {
        self.artifacts_dir(project_id).join(format!("{artifact_id}.md"))
    }

    pub fn runs_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.project_dir(project_id).join("runs")
    }

    pub fn run_dir(&self, project_id: &ProjectId, run_id: &RunId) -> PathBuf {
        self.runs_dir(project_id).join(run_id.as_str())
    }

    pub fn run_yaml(&self, project_id: &ProjectId, run_id: &RunId) -> PathBuf {
        self.run_dir(project_id, run_id).join("run.yaml")
    }

    pub fn events_path(&self, project_id: &ProjectId, run_id: &RunId) -> PathBuf {
        self.run_dir(project_id, run_id).join("events.jsonl")
    }

    pub fn outputs_dir(&self, project_id: &ProjectId, run_id: &RunId) -> PathBuf {
        self.run_dir(project_id, run_id).join("outputs")
    }

    pub fn context_pack_dir(&self, project_id: &ProjectId, ctx_id: &ContextPackId) -> PathBuf {
        self.project_dir(project_id)
            .join("context_packs")
            .join(ctx_id.as_str())
    }

    pub fn context_plan_path(&self, project_id: &ProjectId, ctx_id: &ContextPackId) -> PathBuf {
        self.context_pack_dir(project_id, ctx_id)
            .join("bundle/context_plan.json")
    }

    pub fn local_dir(&self) -> PathBuf {
        self.root.join(".local")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.local_dir().join("sessions")
    }

    pub fn session_record_path(&self, session_ref: &SessionRef) -> PathBuf {
        let encoded = urlencoding::encode(session_ref.as_str()).into_owned();
        self.sessions_dir().join(format!("{encoded}.yaml"))
    }

    pub fn heartbeat_config_path(&self) -> PathBuf {
        self.local_dir().join("heartbeat/config.yaml")
    }

    pub fn heartbeat_state_path(&self) -> PathBuf {
        self.local_dir().join("heartbeat/state.yaml")
    }

    /// Workspace-scoped heartbeat event stream. Chained like any run's
    /// events file, under a synthetic run identity.
    pub fn heartbeat_events_path(&self) -> PathBuf {
        self.local_dir().join("heartbeat/events.jsonl")
    }
}

/// Create the canonical directory skeleton and a minimal company record.
///
/// Idempotent: an existing workspace is left untouched apart from missing
/// directories being filled in.
pub fn init_workspace(root: &Path, company_name: &str) -> Result<WorkspacePaths, StoreError> {
    for sub in [
        "company",
        "org/agents",
        "org/teams",
        "work/projects",
        "inbox/reviews",
        "inbox/comments",
        "inbox/help_requests",
        "inbox/workspace_home",
        ".local/locks",
        ".local/sessions",
        ".local/heartbeat",
    ] {
        std::fs::create_dir_all(root.join(sub))?;
    }

    let paths = WorkspacePaths::new(root);
    if !paths.company_yaml().exists() {
        let company = serde_yaml::to_string(&serde_json::json!({ "name": company_name }))?;
        std::fs::write(paths.company_yaml(), company)?;
    }
    if !paths.policy_yaml().exists() {
        std::fs::write(paths.policy_yaml(), "rules: []\n")?;
    }
    Ok(paths)
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
