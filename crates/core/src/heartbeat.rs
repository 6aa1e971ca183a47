// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat configuration, durable state, and worker-reported actions.
//!
//! The config and state live as workspace singletons under
//! `.local/heartbeat/{config.yaml, state.yaml}`. Worker reports arrive as
//! free-form JSON and deserialize into closed unions; unknown `status` or
//! `kind` tags are rejected at the serde layer.

use crate::id::{AgentId, ProjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `[start_hour, end_hour)` wallclock window.
///
/// `start == end` is an empty window (never quiet); `start > end` wraps
/// midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl QuietHours {
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour == self.end_hour {
            return false;
        }
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// How auto-actions pick their acting identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyMode {
    Flat,
    EnterpriseV1,
}

/// Workspace-level heartbeat configuration singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub tick_interval_minutes: u32,
    pub top_k_workers: usize,
    pub min_wake_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
    pub max_auto_actions_per_tick: u32,
    pub max_auto_actions_per_hour: u32,
    pub ok_suppression_minutes: u32,
    pub idle_suppression_minutes: u32,
    pub idempotency_ttl_days: u32,
    pub hierarchy_mode: HierarchyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executive_manager_agent_id: Option<AgentId>,
    #[serde(default)]
    pub allow_director_to_spawn_workers: bool,
    #[serde(default)]
    pub dry_run: bool,
    // Parsed for config compatibility; recurring-mistakes promotion is not
    // part of the core.
    #[serde(default)]
    pub agents_md_promote_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_interval_minutes: 30,
            top_k_workers: 3,
            min_wake_score: 1,
            quiet_hours: None,
            max_auto_actions_per_tick: 3,
            max_auto_actions_per_hour: 10,
            ok_suppression_minutes: 60,
            idle_suppression_minutes: 120,
            idempotency_ttl_days: 7,
            hierarchy_mode: HierarchyMode::Flat,
            executive_manager_agent_id: None,
            allow_director_to_spawn_workers: false,
            dry_run: false,
            agents_md_promote_threshold: 0,
        }
    }
}

/// Outcome recorded against an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyOutcome {
    Executed,
    Queued,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    pub outcome: IdempotencyOutcome,
    /// ISO 8601 expiry (`recorded_at + idempotency_ttl_days`).
    pub expires_at: String,
}

/// Per-worker suppression bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuppressionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_context_hash: Option<String>,
}

/// Lifetime counters, monotone over the life of the workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatStats {
    pub ticks_total: u64,
    pub workers_woken: u64,
    pub actions_executed: u64,
    pub actions_queued: u64,
    pub actions_deduped: u64,
}

/// Durable heartbeat state singleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatState {
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_tick_at: Option<String>,
    /// Keyed by worker agent id.
    #[serde(default)]
    pub suppression: BTreeMap<String, SuppressionEntry>,
    /// Keyed by UTC `YYYY-MM-DD-HH` bucket.
    #[serde(default)]
    pub hourly_action_counters: BTreeMap<String, u32>,
    /// Keyed by idempotency key.
    #[serde(default)]
    pub idempotency: BTreeMap<String, IdempotencyEntry>,
    #[serde(default)]
    pub stats: HeartbeatStats,
}

impl HeartbeatState {
    /// Drop idempotency entries at or past their expiry and hour buckets
    /// older than the keep set.
    pub fn prune(&mut self, now_iso: &str, keep_hour_buckets: &[String]) {
        self.idempotency
            .retain(|_, entry| entry.expires_at.as_str() > now_iso);
        self.hourly_action_counters
            .retain(|bucket, _| keep_hour_buckets.iter().any(|k| k == bucket));
    }
}

/// Risk declared by the worker for a proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionRisk {
    #[default]
    Low,
    Medium,
    High,
}

/// Closed set of action kinds a heartbeat report may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    LaunchJob,
    AddComment,
    CreateApprovalItem,
    Noop,
}

/// One proposed action from a worker's heartbeat report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAction {
    pub kind: ActionKind,
    pub idempotency_key: String,
    #[serde(default)]
    pub risk: ActionRisk,
    #[serde(default)]
    pub needs_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// The structured report a woken worker must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeartbeatReport {
    Ok {
        /// Must be the literal `HEARTBEAT_OK`.
        token: String,
        summary: String,
    },
    Actions {
        actions: Vec<WorkerAction>,
    },
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
