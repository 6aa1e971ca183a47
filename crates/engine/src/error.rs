// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the orchestration kernel.
//!
//! Every variant carries a stable `code()` string that shows up in events
//! and snapshots. Fatal categories mark the associated run terminal;
//! preflight failures additionally carry `preflight=true` on their
//! `run.failed` event.

use ac_storage::{EventLogError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error("policy denied by {rule_id}: {reason}")]
    PolicyDenied { rule_id: String, reason: String },

    #[error("budget preflight blocked launch: {metric} {actual} >= {threshold}")]
    BudgetExceeded {
        metric: String,
        actual: f64,
        threshold: f64,
    },

    #[error("subscription unverified for {provider}: {reason}")]
    SubscriptionUnverified { provider: String, reason: String },

    #[error("launch lane canceled")]
    LaneCanceled,

    #[error("launch lane timed out")]
    LaneTimeout,

    #[error("worker launch failed: {0}")]
    WorkerLaunchFailed(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("orphaned detached session: {0}")]
    OrphanedSession(String),

    #[error("pid may have been reused for session {0}")]
    PidPossiblyRecycled(String),

    #[error("driver: {0}")]
    Driver(#[from] ac_adapters::DriverError),

    #[error("schema invalid: {0}")]
    SchemaInvalid(String),
}

impl EngineError {
    /// Stable error code per the system taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Store(e) => e.code(),
            EngineError::EventLog(e) => e.code(),
            EngineError::PolicyDenied { .. } => "policy_denied",
            EngineError::BudgetExceeded { .. } => "budget_exceeded",
            EngineError::SubscriptionUnverified { .. } => "subscription_unverified",
            EngineError::LaneCanceled => "lane_canceled",
            EngineError::LaneTimeout => "lane_timeout",
            EngineError::WorkerLaunchFailed(_) => "worker_launch_failed",
            EngineError::SessionNotFound(_) => "worker_launch_failed",
            EngineError::OrphanedSession(_) => "orphaned_session",
            EngineError::PidPossiblyRecycled(_) => "pid_possibly_recycled",
            EngineError::Driver(_) => "worker_launch_failed",
            EngineError::SchemaInvalid(_) => "schema_invalid",
        }
    }
}
