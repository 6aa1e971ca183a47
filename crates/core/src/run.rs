// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records (`run.yaml`) and usage accounting.

use crate::id::{AgentId, ContextPackId, ProjectId, RunId};
use serde::{Deserialize, Serialize};

/// Status of a run. Transitions are monotonic: `running` moves to exactly
/// one terminal state and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Ended,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Ended => "ended",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Where a usage figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    ProviderReported,
    EstimatedChars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageConfidence {
    High,
    Low,
}

/// Token and cost accounting for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunUsage {
    pub source: UsageSource,
    pub confidence: UsageConfidence,
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
    pub cost_usd: f64,
    pub cost_source: String,
}

impl RunUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            + self.cached_input_tokens
            + self.output_tokens
            + self.reasoning_output_tokens
    }

    /// Estimate usage from raw character counts: chars / 4, low confidence.
    pub fn estimated_from_chars(input_chars: u64, output_chars: u64) -> Self {
        Self {
            source: UsageSource::EstimatedChars,
            confidence: UsageConfidence::Low,
            input_tokens: input_chars / 4,
            cached_input_tokens: 0,
            output_tokens: output_chars / 4,
            reasoning_output_tokens: 0,
            cost_usd: 0.0,
            cost_source: "estimated_chars".to_string(),
        }
    }
}

/// The canonical `run.yaml` record owned by a project's `runs/<run_id>/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub status: RunStatus,
    pub provider: String,
    pub agent_id: AgentId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_pack_id: Option<ContextPackId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<RunUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Number of context cycles this run contributed; > 0 marks it as
    /// trajectory material for the context planner.
    #[serde(default)]
    pub context_cycles_count: u32,
}

impl RunRecord {
    pub fn new(id: RunId, provider: impl Into<String>, agent_id: AgentId, project_id: ProjectId) -> Self {
        Self {
            id,
            status: RunStatus::Running,
            provider: provider.into(),
            agent_id,
            project_id,
            context_pack_id: None,
            usage: None,
            exit_code: None,
            error: None,
            blocked_reason: None,
            created_at: None,
            context_cycles_count: 0,
        }
    }

    /// Apply a terminal status. Once terminal, later transitions are ignored.
    pub fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
