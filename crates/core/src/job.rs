// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job envelopes: one unit of worker work.

use crate::actor::Role;
use crate::id::{AgentId, JobId, ProjectId, TeamId};
use serde::{Deserialize, Serialize};

/// What kind of work a job carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Execution,
    Heartbeat,
}

/// How much of the workspace the worker process may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionLevel {
    ReadOnly,
    WorkspaceWrite,
    Unrestricted,
}

/// Launch-lane priority class. Strict priority across classes, FIFO within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Envelope for a unit of worker work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub job_kind: JobKind,
    pub worker_kind: String,
    pub goal: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub context_refs: Vec<String>,
    pub permission_level: PermissionLevel,
    pub worker_agent_id: AgentId,
    pub manager_actor_id: String,
    pub manager_role: Role,
    pub max_context_refs: usize,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub provider: String,
    #[serde(default)]
    pub priority: Priority,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
