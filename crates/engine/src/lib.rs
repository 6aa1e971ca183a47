// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ac-engine: the runtime orchestration kernel.
//!
//! Session lifecycle, policy and budget gates, the launch lane scheduler,
//! the worker result contract, the heartbeat scheduler, the context
//! planner, and read-side snapshots, all rooted in the atomic workspace
//! store.

pub mod budget;
pub mod context;
pub mod env;
mod error;
pub mod heartbeat;
pub mod lane;
pub mod policy;
mod runtime;
pub mod secrets;
pub mod sessions;
pub mod snapshot;
pub mod worker;

pub use error::EngineError;
pub use runtime::EngineRuntime;

pub use budget::{BudgetCeiling, BudgetCheck, BudgetResult, BudgetScope, BudgetVerdict};
pub use context::{plan_context_for_job, persist_context_plan_for_run, ContextPlan, ContextRef,
    PlanRequest};
pub use heartbeat::{HeartbeatJobRunner, HeartbeatScheduler, TickSummary};
pub use lane::{BackpressureClass, BackpressureOpts, LaneJob, LaneStats, LaunchLanes};
pub use policy::{enforce_policy, PolicyAction, PolicyDecision, ResourceCtx};
pub use sessions::{
    LaunchGates, LaunchSpec, SessionCollect, SessionFilter, SessionManager, SessionPoll,
};
pub use snapshot::{colleagues, review_inbox, run_rows, ColleagueRow, ReviewInbox, RunRow};
pub use worker::{normalize_output, repair_prompt, AttemptOutcome, AttemptSpec, WorkerRunner};
