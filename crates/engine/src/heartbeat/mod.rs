// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat scheduler: the workspace-scoped triage tick.
//!
//! Each tick wakes the most pressed workers, collects their structured
//! reports, and feeds proposed actions through the approval/auto-execute
//! rules. Ticks are serialized per workspace; durable state lives at
//! `.local/heartbeat/state.yaml` and is written only when the config's
//! `dry_run` is off.

pub mod actions;
pub mod triage;

use ac_core::{
    ActionKind, AgentId, Clock, EventDraft, HeartbeatConfig, HeartbeatReport, HeartbeatState,
    JobId, JobKind, JobSpec, PermissionLevel, Priority, ProjectId, Role, RunId, SessionRef,
    UuidIdGen, WorkerAction,
};
use ac_storage::{EventLog, HeartbeatStore, Store, WorkspacePaths, WriteOpts};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;
use actions::{ActionCtx, ActionOutcome, Decision};
use triage::WorkerCandidate;

/// Per-tick deadline for each woken worker's report.
pub const TICK_JOB_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Heartbeat context packs are deliberately small.
pub const HEARTBEAT_MAX_CONTEXT_REFS: usize = 8;

/// Synthetic run identity for the workspace-scoped heartbeat stream.
const HEARTBEAT_RUN_ID: &str = "run_heartbeat";
const HEARTBEAT_SESSION_REF: &str = "heartbeat";

/// Seam through which heartbeat work reaches the launch lane and the
/// worker adapter.
#[async_trait]
pub trait HeartbeatJobRunner: Send + Sync {
    /// Run one heartbeat job to completion and parse the worker's report.
    async fn run_heartbeat_job(
        &self,
        workspace_dir: &Path,
        job: JobSpec,
        prompt: String,
        timeout: Duration,
    ) -> Result<HeartbeatReport, EngineError>;

    /// Launch an auto-approved execution job (fire and forget).
    async fn launch_execution_job(
        &self,
        workspace_dir: &Path,
        job: JobSpec,
    ) -> Result<(), EngineError>;
}

/// Outcome bookkeeping for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub ran: bool,
    pub skipped_reason: Option<String>,
    pub candidates: usize,
    pub woken: Vec<AgentId>,
    pub ok_reports: usize,
    pub action_outcomes: Vec<(String, ActionOutcome)>,
    pub worker_errors: Vec<(AgentId, String)>,
}

/// The scheduler itself. One instance serves many workspaces.
#[derive(Clone)]
pub struct HeartbeatScheduler<C: Clock> {
    clock: C,
    store: Store,
    hb_store: HeartbeatStore,
    event_log: EventLog<C>,
    runner: Arc<dyn HeartbeatJobRunner>,
    ticking: Arc<SyncMutex<HashSet<PathBuf>>>,
    loops: Arc<SyncMutex<HashMap<PathBuf, tokio::task::JoinHandle<()>>>>,
    id_gen: UuidIdGen,
}

impl<C: Clock + 'static> HeartbeatScheduler<C> {
    pub fn new(
        clock: C,
        store: Store,
        hb_store: HeartbeatStore,
        event_log: EventLog<C>,
        runner: Arc<dyn HeartbeatJobRunner>,
    ) -> Self {
        Self {
            clock,
            store,
            hb_store,
            event_log,
            runner,
            ticking: Arc::new(SyncMutex::new(HashSet::new())),
            loops: Arc::new(SyncMutex::new(HashMap::new())),
            id_gen: UuidIdGen,
        }
    }

    /// Append to the workspace's heartbeat event stream. Best effort: a
    /// failed append never fails the tick itself.
    async fn emit(&self, paths: &WorkspacePaths, draft: EventDraft) {
        let events_path = paths.heartbeat_events_path();
        let run_id = RunId::new(HEARTBEAT_RUN_ID);
        let session_ref = SessionRef::new(HEARTBEAT_SESSION_REF);
        if let Err(e) = self
            .event_log
            .append(&events_path, &run_id, &session_ref, draft)
            .await
        {
            tracing::warn!(error = %e, "failed to append heartbeat event");
        }
    }

    /// Arm the tick loop for a workspace. Idempotent.
    pub fn observe_workspace(&self, workspace_dir: &Path) {
        let mut loops = self.loops.lock();
        if loops.contains_key(workspace_dir) {
            return;
        }
        let scheduler = self.clone();
        let dir = workspace_dir.to_path_buf();
        let handle = tokio::spawn(async move {
            loop {
                let interval = {
                    let paths = WorkspacePaths::new(&dir);
                    scheduler
                        .hb_store
                        .load_config(&paths)
                        .map(|c| Duration::from_secs(u64::from(c.tick_interval_minutes) * 60))
                        .unwrap_or(Duration::from_secs(30 * 60))
                };
                tokio::time::sleep(interval).await;
                if let Err(e) = scheduler.tick(&dir, false).await {
                    tracing::warn!(workspace = %dir.display(), error = %e, "heartbeat tick failed");
                }
            }
        });
        loops.insert(workspace_dir.to_path_buf(), handle);
    }

    /// Stop observing and drop all loop tasks.
    pub fn reset_for_tests(&self) {
        let mut loops = self.loops.lock();
        for (_, handle) in loops.drain() {
            handle.abort();
        }
        self.ticking.lock().clear();
    }

    /// One triage tick. `force` overrides `enabled=false`.
    pub async fn tick(&self, workspace_dir: &Path, force: bool) -> Result<TickSummary, EngineError> {
        // Reentrancy guard: ticks never overlap per workspace
        let already_ticking = {
            let mut ticking = self.ticking.lock();
            !ticking.insert(workspace_dir.to_path_buf())
        };
        if already_ticking {
            let paths = WorkspacePaths::new(workspace_dir);
            self.emit(
                &paths,
                EventDraft::heartbeat_tick(0, 0, 0, Some("skipped_due_to_running")),
            )
            .await;
            return Ok(TickSummary {
                skipped_reason: Some("skipped_due_to_running".to_string()),
                ..TickSummary::default()
            });
        }
        let result = self.tick_inner(workspace_dir, force).await;
        self.ticking.lock().remove(workspace_dir);
        result
    }

    async fn tick_inner(
        &self,
        workspace_dir: &Path,
        force: bool,
    ) -> Result<TickSummary, EngineError> {
        let paths = WorkspacePaths::new(workspace_dir);
        let config = self.hb_store.load_config(&paths)?;
        let now_ms = self.clock.epoch_ms();
        let now_iso = triage::iso_from_epoch_ms(now_ms);

        if !config.enabled && !force {
            self.emit(
                &paths,
                EventDraft::heartbeat_tick(0, 0, 0, Some("heartbeat_disabled")),
            )
            .await;
            return Ok(TickSummary {
                skipped_reason: Some("heartbeat_disabled".to_string()),
                ..TickSummary::default()
            });
        }

        let mut state = self.hb_store.load_state(&paths)?;
        state.prune(&now_iso, &actions::recent_hour_buckets(&now_iso));

        let candidates = triage::triage(&paths, &config, &state, &now_iso, now_ms);
        let mut summary = TickSummary {
            ran: true,
            candidates: candidates.len(),
            ..TickSummary::default()
        };

        let mut executed_this_tick = 0u32;
        for candidate in &candidates {
            summary.woken.push(candidate.agent_id.clone());
            state.stats.workers_woken += 1;
            state
                .suppression
                .entry(candidate.agent_id.as_str().to_string())
                .or_default()
                .last_context_hash = Some(candidate.context_hash.clone());

            let job = heartbeat_job(&self.id_gen, candidate, &config);
            let prompt = heartbeat_prompt(candidate);
            let report = self
                .runner
                .run_heartbeat_job(workspace_dir, job, prompt, TICK_JOB_TIMEOUT)
                .await;

            match report {
                Ok(HeartbeatReport::Ok { token, .. }) => {
                    if token != "HEARTBEAT_OK" {
                        summary
                            .worker_errors
                            .push((candidate.agent_id.clone(), "bad ok token".to_string()));
                        continue;
                    }
                    summary.ok_reports += 1;
                    let until = suppress_until(&now_iso, config.ok_suppression_minutes);
                    state
                        .suppression
                        .entry(candidate.agent_id.as_str().to_string())
                        .or_default()
                        .suppressed_until = Some(until);
                }
                Ok(HeartbeatReport::Actions { actions }) => {
                    for action in actions {
                        let outcome = self
                            .apply_action(
                                &paths,
                                &config,
                                &mut state,
                                candidate,
                                &action,
                                &now_iso,
                                &mut executed_this_tick,
                            )
                            .await;
                        summary
                            .action_outcomes
                            .push((action.idempotency_key.clone(), outcome));
                    }
                }
                Err(e) => {
                    summary
                        .worker_errors
                        .push((candidate.agent_id.clone(), e.to_string()));
                }
            }
        }

        state.stats.ticks_total += 1;
        state.last_tick_at = Some(now_iso.clone());
        state.next_tick_at = Some(suppress_until(&now_iso, config.tick_interval_minutes));
        state.running = true;

        if !config.dry_run {
            let final_state = state;
            self.hb_store
                .update_state(&paths, move |persisted| *persisted = final_state)
                .await?;
        }

        self.emit(
            &paths,
            EventDraft::heartbeat_tick(
                summary.candidates,
                summary.woken.len(),
                summary.ok_reports,
                None,
            ),
        )
        .await;
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_action(
        &self,
        paths: &WorkspacePaths,
        config: &HeartbeatConfig,
        state: &mut HeartbeatState,
        candidate: &WorkerCandidate,
        action: &WorkerAction,
        now_iso: &str,
        executed_this_tick: &mut u32,
    ) -> ActionOutcome {
        let outcome = self
            .apply_action_rules(paths, config, state, candidate, action, now_iso, executed_this_tick)
            .await;

        let (label, detail) = match &outcome {
            ActionOutcome::Executed => ("executed", None),
            ActionOutcome::QueuedForApproval { artifact_id } => {
                ("queued", Some(artifact_id.as_str().to_string()))
            }
            ActionOutcome::Deduped => ("deduped", None),
            ActionOutcome::Skipped { reason } => ("skipped", Some(reason.clone())),
        };
        self.emit(
            paths,
            EventDraft::heartbeat_action(
                label,
                &action.idempotency_key,
                action_kind_str(action.kind),
                candidate.agent_id.as_str(),
                detail.as_deref(),
            ),
        )
        .await;
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_action_rules(
        &self,
        paths: &WorkspacePaths,
        config: &HeartbeatConfig,
        state: &mut HeartbeatState,
        candidate: &WorkerCandidate,
        action: &WorkerAction,
        now_iso: &str,
        executed_this_tick: &mut u32,
    ) -> ActionOutcome {
        let ctx = ActionCtx {
            config,
            now_iso: now_iso.to_string(),
            hour_bucket: actions::hour_bucket(now_iso),
            hour_of_day: hour_of_day(now_iso),
            source_worker: candidate.agent_id.clone(),
            source_role: candidate.role,
            default_project: candidate.project_id.clone(),
            run_id: None,
        };

        match actions::decide(state, &ctx, action, *executed_this_tick) {
            Decision::Deduped => ActionOutcome::Deduped,
            Decision::Skip { reason } => ActionOutcome::Skipped { reason },
            Decision::Queue { .. } => {
                match actions::queue_for_approval(state, &ctx, action, &self.id_gen) {
                    Ok((artifact_id, project_id, content)) => {
                        let path = paths.artifact_path(&project_id, artifact_id.as_str());
                        match self
                            .store
                            .write_atomic(&path, content.as_bytes(), WriteOpts::default())
                            .await
                        {
                            Ok(()) => ActionOutcome::QueuedForApproval { artifact_id },
                            Err(e) => ActionOutcome::Skipped {
                                reason: format!("proposal_write_failed:{}", e.code()),
                            },
                        }
                    }
                    Err(outcome) => outcome,
                }
            }
            Decision::Execute { actor } => {
                let executed = match action.kind {
                    ActionKind::LaunchJob => {
                        let job = execution_job(&self.id_gen, candidate, action, &actor, config);
                        match self.runner.launch_execution_job(paths.root(), job).await {
                            Ok(()) => true,
                            Err(e) => {
                                return ActionOutcome::Skipped {
                                    reason: format!("launch_failed:{}", e.code()),
                                }
                            }
                        }
                    }
                    ActionKind::AddComment => {
                        match self.write_comment(paths, candidate, action, now_iso).await {
                            Ok(()) => true,
                            Err(e) => {
                                return ActionOutcome::Skipped {
                                    reason: format!("comment_failed:{}", e.code()),
                                }
                            }
                        }
                    }
                    // Reaching Execute for these kinds means no side effect
                    ActionKind::CreateApprovalItem | ActionKind::Noop => true,
                };
                if executed {
                    actions::record_executed(state, &ctx, action);
                    *executed_this_tick += 1;
                }
                ActionOutcome::Executed
            }
        }
    }

    async fn write_comment(
        &self,
        paths: &WorkspacePaths,
        candidate: &WorkerCandidate,
        action: &WorkerAction,
        now_iso: &str,
    ) -> Result<(), ac_storage::StoreError> {
        let name = format!("cmt_{}.yaml", uuid::Uuid::new_v4().simple());
        let path = paths.root().join("inbox/comments").join(name);
        let record = serde_json::json!({
            "author": candidate.agent_id.as_str(),
            "target": action.target,
            "text": action.comment.clone().unwrap_or_default(),
            "created_at": now_iso,
            "source": "heartbeat_auto_action",
        });
        self.store
            .write_yaml(&path, &record, WriteOpts::default())
            .await
    }
}

/// `{status:"ok"| "actions"}` parsing out of arbitrary worker output.
pub fn parse_heartbeat_report(raw: &str) -> Result<HeartbeatReport, String> {
    for candidate in ac_adapters::extract_candidates(raw) {
        let Some(obj) = candidate.as_object() else {
            continue;
        };
        if !obj.contains_key("status") {
            continue;
        }
        if let Ok(report) = serde_json::from_value::<HeartbeatReport>(candidate.clone()) {
            return Ok(report);
        }
    }
    Err("no parseable heartbeat report in worker output".to_string())
}

/// The HeartbeatWorkerReport prompt for one woken worker.
pub fn heartbeat_prompt(candidate: &WorkerCandidate) -> String {
    format!(
        "You are {agent}. This is a heartbeat check-in.\n\
         Signals since your last wake: {new} new inbox items, {due} tasks due, \
         {overdue} overdue, {stuck} stuck jobs.\n\n\
         Reply with ONLY one strict JSON object, one of:\n\
         {{\"status\":\"ok\",\"token\":\"HEARTBEAT_OK\",\"summary\":\"<one line>\"}}\n\
         {{\"status\":\"actions\",\"actions\":[{{\"kind\":\"launch_job|add_comment|create_approval_item|noop\",\
         \"idempotency_key\":\"<stable key>\",\"risk\":\"low|medium|high\",\
         \"needs_approval\":false,\"summary\":\"...\"}}]}}",
        agent = candidate.agent_id,
        new = candidate.signals.new_signals,
        due = candidate.signals.due_tasks,
        overdue = candidate.signals.overdue_tasks,
        stuck = candidate.signals.stuck_jobs,
    )
}

fn heartbeat_job(
    id_gen: &UuidIdGen,
    candidate: &WorkerCandidate,
    _config: &HeartbeatConfig,
) -> JobSpec {
    JobSpec {
        id: JobId::fresh(id_gen),
        job_kind: JobKind::Heartbeat,
        worker_kind: "heartbeat".to_string(),
        goal: "heartbeat check-in".to_string(),
        constraints: vec![],
        deliverables: vec!["HeartbeatWorkerReport".to_string()],
        context_refs: vec![],
        permission_level: PermissionLevel::ReadOnly,
        worker_agent_id: candidate.agent_id.clone(),
        manager_actor_id: "system".to_string(),
        manager_role: Role::Manager,
        max_context_refs: HEARTBEAT_MAX_CONTEXT_REFS,
        project_id: candidate
            .project_id
            .clone()
            .unwrap_or_else(|| ProjectId::new("proj_default")),
        team_id: None,
        provider: "claude".to_string(),
        priority: Priority::Low,
    }
}

fn execution_job(
    id_gen: &UuidIdGen,
    candidate: &WorkerCandidate,
    action: &WorkerAction,
    actor: &ac_core::Actor,
    _config: &HeartbeatConfig,
) -> JobSpec {
    JobSpec {
        id: JobId::fresh(id_gen),
        job_kind: JobKind::Execution,
        worker_kind: "auto_action".to_string(),
        goal: action
            .goal
            .clone()
            .or_else(|| action.summary.clone())
            .unwrap_or_else(|| "follow up on heartbeat findings".to_string()),
        constraints: vec![],
        deliverables: vec![],
        context_refs: vec![],
        permission_level: PermissionLevel::WorkspaceWrite,
        worker_agent_id: candidate.agent_id.clone(),
        manager_actor_id: actor.id.clone(),
        manager_role: actor.role,
        max_context_refs: HEARTBEAT_MAX_CONTEXT_REFS,
        project_id: action
            .project_id
            .clone()
            .or_else(|| candidate.project_id.clone())
            .unwrap_or_else(|| ProjectId::new("proj_default")),
        team_id: None,
        provider: "claude".to_string(),
        priority: Priority::Normal,
    }
}

fn action_kind_str(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::LaunchJob => "launch_job",
        ActionKind::AddComment => "add_comment",
        ActionKind::CreateApprovalItem => "create_approval_item",
        ActionKind::Noop => "noop",
    }
}

fn suppress_until(now_iso: &str, minutes: u32) -> String {
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    now_iso
        .parse::<DateTime<Utc>>()
        .ok()
        .map(|t| {
            (t + ChronoDuration::minutes(i64::from(minutes)))
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        })
        .unwrap_or_else(|| now_iso.to_string())
}

fn hour_of_day(now_iso: &str) -> u8 {
    now_iso
        .get(11..13)
        .and_then(|h| h.parse::<u8>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
