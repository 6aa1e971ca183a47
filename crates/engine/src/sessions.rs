// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: spawn, poll, stop, and reconcile the external worker
//! subprocesses bound to runs.
//!
//! Sessions are spawned detached (their own process group) so they survive
//! control-plane restarts. The durable session record (see
//! [`ac_storage::session_store`]) carries the pid and the time it was
//! claimed; a cold poll reconciles records whose process died while nobody
//! was watching, and a detached stop refuses pids claimed more than
//! [`PID_REUSE_WINDOW`] ago.

use ac_core::{
    Actor, Clock, EventDraft, ProjectId, RunId, RunRecord, RunStatus, SessionRef, TaskId,
};
use ac_adapters::SubscriptionCheck;
use ac_storage::{argv_digest, EventLog, SessionRecord, SessionStore, Store, WorkspacePaths,
    WriteOpts};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::budget;
use crate::error::EngineError;
use crate::policy::{enforce_policy, PolicyAction, ResourceCtx};

/// Detached stops refuse pids claimed more than 30 minutes ago; the OS may
/// have recycled them.
pub const PID_REUSE_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Grace between SIGTERM and SIGKILL.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Poll cadence while waiting for termination.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Preflight gates evaluated before any spawn.
#[derive(Default)]
pub struct LaunchGates {
    /// Policy check to run as the launch actor.
    pub policy: Option<(PolicyAction, ResourceCtx)>,
    /// Evaluate the project budget at preflight.
    pub budget: bool,
    pub task_id: Option<TaskId>,
    /// Pre-computed subscription guard outcome (from the worker adapter).
    pub subscription: Option<SubscriptionCheck>,
}

/// Everything needed to launch one session.
pub struct LaunchSpec {
    pub workspace_dir: PathBuf,
    pub project_id: ProjectId,
    pub run_id: RunId,
    pub provider: String,
    pub agent_id: ac_core::AgentId,
    pub argv: Vec<String>,
    pub stdin_text: Option<String>,
    pub env: Vec<(String, String)>,
    pub session_ref: Option<SessionRef>,
    pub actor: Option<Actor>,
    pub gates: LaunchGates,
}

/// Result of a `poll_session` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPoll {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub error: Option<String>,
}

/// Result of a `collect_session` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCollect {
    pub status: RunStatus,
    pub output_relpaths: Vec<String>,
}

/// Filters for `list_sessions`.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<RunStatus>,
    pub run_id: Option<RunId>,
    pub project_id: Option<ProjectId>,
}

/// Why a live session is being terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopIntent {
    None,
    /// Caller asked for a stop; terminal status `stopped`.
    Stop,
    /// Attempt deadline elapsed; terminal status `failed`, "timed out".
    Timeout,
}

struct LiveSession {
    record: SessionRecord,
    workspace: PathBuf,
    intent: StopIntent,
}

/// The in-process session table plus everything needed to finalize runs.
#[derive(Clone)]
pub struct SessionManager<C: Clock> {
    clock: C,
    store: Store,
    sessions: SessionStore,
    event_log: EventLog<C>,
    live: Arc<SyncMutex<HashMap<SessionRef, LiveSession>>>,
}

impl<C: Clock + 'static> SessionManager<C> {
    pub fn new(clock: C, store: Store, sessions: SessionStore, event_log: EventLog<C>) -> Self {
        Self {
            clock,
            store,
            sessions,
            event_log,
            live: Arc::new(SyncMutex::new(HashMap::new())),
        }
    }

    /// Drop the in-memory table, simulating a control-plane restart.
    pub fn reset_for_tests(&self) {
        self.live.lock().clear();
    }

    /// Launch a worker subprocess attached to a run.
    ///
    /// Emits `run.started` (idempotent), runs the preflight gates, spawns
    /// detached with stdout/stderr redirected into the run's outputs
    /// directory, and persists the session record. On any gate denial the
    /// run is marked failed with `run.failed{preflight=true}` and no child
    /// process is ever spawned.
    pub async fn launch_session(&self, spec: LaunchSpec) -> Result<SessionRef, EngineError> {
        let paths = WorkspacePaths::new(&spec.workspace_dir);
        let session_ref = spec
            .session_ref
            .clone()
            .unwrap_or_else(|| SessionRef::local(&spec.run_id));
        let run_dir = paths.run_dir(&spec.project_id, &spec.run_id);
        let events_path = paths.events_path(&spec.project_id, &spec.run_id);
        let actor_id = spec
            .actor
            .as_ref()
            .map(|a| a.id.clone())
            .unwrap_or_else(|| "system".to_string());

        self.event_log.ensure_run_files(&run_dir)?;
        self.ensure_run_record(&paths, &spec).await?;

        if !self.event_log.has_event(&events_path, "run.started") {
            self.event_log
                .append(
                    &events_path,
                    &spec.run_id,
                    &session_ref,
                    EventDraft::run_started(&spec.provider, spec.agent_id.as_str())
                        .actor(actor_id.clone()),
                )
                .await?;
        }

        // -- preflight gates; every denial path refuses the spawn --

        if let Some((action, resource)) = &spec.gates.policy {
            let actor = spec
                .actor
                .clone()
                .unwrap_or_else(|| Actor::new("system", ac_core::Role::Human));
            let decision = enforce_policy(&actor, *action, resource);
            self.event_log
                .append(
                    &events_path,
                    &spec.run_id,
                    &session_ref,
                    EventDraft::policy_decision(
                        &decision.rule_id,
                        decision.allowed,
                        &decision.reason,
                    )
                    .actor(actor_id.clone()),
                )
                .await?;
            if !decision.allowed {
                self.event_log
                    .append(
                        &events_path,
                        &spec.run_id,
                        &session_ref,
                        EventDraft::policy_denied(&decision.rule_id, &decision.reason)
                            .actor(actor_id.clone()),
                    )
                    .await?;
                self.fail_preflight(&paths, &spec, &session_ref, "policy_denied")
                    .await?;
                return Err(EngineError::PolicyDenied {
                    rule_id: decision.rule_id,
                    reason: decision.reason,
                });
            }
        }

        if spec.gates.budget {
            let verdict = budget::preflight(&paths, &spec.project_id, spec.gates.task_id.as_ref());
            for draft in verdict.event_drafts("preflight") {
                self.event_log
                    .append(&events_path, &spec.run_id, &session_ref, draft.actor(actor_id.clone()))
                    .await?;
            }
            if let Some(blocked) = verdict.blocked {
                self.fail_preflight(&paths, &spec, &session_ref, "budget_preflight_exceeded")
                    .await?;
                return Err(EngineError::BudgetExceeded {
                    metric: blocked.metric.to_string(),
                    actual: blocked.actual,
                    threshold: blocked.threshold,
                });
            }
        }

        if let Some(check) = &spec.gates.subscription {
            self.event_log
                .append(
                    &events_path,
                    &spec.run_id,
                    &session_ref,
                    EventDraft::subscription_check(
                        check.passed,
                        &check.bin,
                        &check.strategy,
                        &check.reason,
                    )
                    .actor(actor_id.clone()),
                )
                .await?;
            if !check.passed {
                self.set_run_terminal(
                    &paths,
                    &spec.project_id,
                    &spec.run_id,
                    RunStatus::Failed,
                    None,
                    Some("subscription_unverified"),
                )
                .await?;
                self.event_log
                    .append(
                        &events_path,
                        &spec.run_id,
                        &session_ref,
                        EventDraft::run_failed("subscription_unverified", true)
                            .actor(actor_id.clone()),
                    )
                    .await?;
                return Err(EngineError::SubscriptionUnverified {
                    provider: spec.provider.clone(),
                    reason: check.reason.clone(),
                });
            }
        }

        // -- spawn detached --

        let outputs_dir = paths.outputs_dir(&spec.project_id, &spec.run_id);
        std::fs::create_dir_all(&outputs_dir).map_err(ac_storage::StoreError::from)?;
        let stdout_path = outputs_dir.join("stdout.txt");
        let stderr_path = outputs_dir.join("stderr.txt");

        let Some((program, args)) = spec.argv.split_first() else {
            self.fail_spawn(&paths, &spec, &session_ref, "empty argv").await?;
            return Err(EngineError::WorkerLaunchFailed("empty argv".to_string()));
        };

        let spawn_result = (|| -> std::io::Result<tokio::process::Child> {
            let stdout = std::fs::File::create(&stdout_path)?;
            let stderr = std::fs::File::create(&stderr_path)?;
            let mut cmd = std::process::Command::new(program);
            cmd.args(args)
                .current_dir(&spec.workspace_dir)
                .stdout(stdout)
                .stderr(stderr)
                .stdin(if spec.stdin_text.is_some() {
                    std::process::Stdio::piped()
                } else {
                    std::process::Stdio::null()
                });
            for (key, value) in &spec.env {
                cmd.env(key, value);
            }
            // Detach into its own process group so the session outlives us
            {
                use std::os::unix::process::CommandExt;
                cmd.process_group(0);
            }
            let mut cmd = tokio::process::Command::from(cmd);
            cmd.kill_on_drop(false);
            cmd.spawn()
        })();

        let mut child = match spawn_result {
            Ok(child) => child,
            Err(e) => {
                let message = format!("spawn failed: {e}");
                self.fail_spawn(&paths, &spec, &session_ref, &message).await?;
                return Err(EngineError::WorkerLaunchFailed(message));
            }
        };

        if let Some(text) = &spec.stdin_text {
            if let Some(mut stdin) = child.stdin.take() {
                use tokio::io::AsyncWriteExt;
                let _ = stdin.write_all(text.as_bytes()).await;
                // Closing stdin signals end of input
                drop(stdin);
            }
        }

        let pid = child.id().unwrap_or_default();
        let now_ms = self.clock.epoch_ms();
        let record = SessionRecord {
            session_ref: session_ref.clone(),
            run_id: spec.run_id.clone(),
            project_id: spec.project_id.clone(),
            status: RunStatus::Running,
            pid: Some(pid),
            pid_claimed_at_ms: Some(now_ms),
            started_at_ms: now_ms,
            ended_at_ms: None,
            exit_code: None,
            signal: None,
            error: None,
            output_relpaths: vec![
                "outputs/stdout.txt".to_string(),
                "outputs/stderr.txt".to_string(),
            ],
            argv_digest: argv_digest(&spec.argv),
        };
        self.sessions.save(&paths, &record).await?;
        self.live.lock().insert(
            session_ref.clone(),
            LiveSession {
                record,
                workspace: spec.workspace_dir.clone(),
                intent: StopIntent::None,
            },
        );

        tracing::info!(
            session_ref = %session_ref,
            run_id = %spec.run_id,
            pid,
            "session launched"
        );

        self.spawn_waiter(session_ref.clone(), child);
        Ok(session_ref)
    }

    /// Current status of a session. Never suspends.
    ///
    /// With a cold in-memory table, a persisted non-terminal record whose
    /// pid is gone is promoted to `failed` ("orphaned detached session")
    /// and the run record is updated to match.
    pub fn poll_session(&self, workspace: &WorkspacePaths, session_ref: &SessionRef)
        -> Result<SessionPoll, EngineError> {
        if let Some(live) = self.live.lock().get(session_ref) {
            return Ok(poll_of(&live.record));
        }

        let Some(mut record) = self.sessions.load(workspace, session_ref)? else {
            return Err(EngineError::SessionNotFound(session_ref.to_string()));
        };
        if record.is_terminal() {
            return Ok(poll_of(&record));
        }

        let alive = record.pid.map(pid_alive).unwrap_or(false);
        if alive {
            return Ok(poll_of(&record));
        }

        // Orphan: non-terminal record, dead process
        record.status = RunStatus::Failed;
        record.error = Some("orphaned detached session".to_string());
        record.ended_at_ms = Some(self.clock.epoch_ms());
        self.persist_reconciled(workspace, &record);
        Ok(poll_of(&record))
    }

    /// Request termination: SIGTERM, a short grace, then SIGKILL.
    ///
    /// For a detached session (cold table) the persisted pid is used only
    /// while its claim is younger than [`PID_REUSE_WINDOW`]; otherwise the
    /// call returns `running` with a pid-reuse warning and signals nothing.
    pub async fn stop_session(
        &self,
        workspace: &WorkspacePaths,
        session_ref: &SessionRef,
    ) -> Result<SessionPoll, EngineError> {
        if let Some(poll) = self
            .stop_live_with_intent(session_ref, StopIntent::Stop)
            .await?
        {
            return Ok(poll);
        }

        // Detached path: only the persisted record knows the pid
        let Some(mut record) = self.sessions.load(workspace, session_ref)? else {
            return Err(EngineError::SessionNotFound(session_ref.to_string()));
        };
        if record.is_terminal() {
            return Ok(poll_of(&record));
        }
        let Some(pid) = record.pid else {
            return Ok(poll_of(&record));
        };

        let claim_age_ms = self
            .clock
            .epoch_ms()
            .saturating_sub(record.pid_claimed_at_ms.unwrap_or(0));
        if claim_age_ms >= PID_REUSE_WINDOW.as_millis() as u64 {
            tracing::warn!(
                session_ref = %session_ref,
                pid,
                claim_age_ms,
                "refusing to signal stale pid"
            );
            return Ok(SessionPoll {
                status: RunStatus::Running,
                exit_code: None,
                signal: None,
                error: Some("pid may have been reused".to_string()),
            });
        }

        terminate_with_grace(pid).await;
        record.status = RunStatus::Stopped;
        record.signal = Some("SIGTERM".to_string());
        record.ended_at_ms = Some(self.clock.epoch_ms());
        self.persist_reconciled(workspace, &record);
        Ok(poll_of(&record))
    }

    /// Output relpaths and final status.
    pub fn collect_session(
        &self,
        workspace: &WorkspacePaths,
        session_ref: &SessionRef,
    ) -> Result<SessionCollect, EngineError> {
        if let Some(live) = self.live.lock().get(session_ref) {
            return Ok(SessionCollect {
                status: live.record.status,
                output_relpaths: live.record.output_relpaths.clone(),
            });
        }
        let Some(record) = self.sessions.load(workspace, session_ref)? else {
            return Err(EngineError::SessionNotFound(session_ref.to_string()));
        };
        Ok(SessionCollect {
            status: record.status,
            output_relpaths: record.output_relpaths,
        })
    }

    /// Records from the in-memory table and the sessions directory,
    /// deduplicated by ref (the live entry wins).
    pub fn list_sessions(
        &self,
        workspace: &WorkspacePaths,
        filter: &SessionFilter,
    ) -> Vec<SessionRecord> {
        let mut by_ref: HashMap<SessionRef, SessionRecord> = self
            .sessions
            .list(workspace)
            .into_iter()
            .map(|r| (r.session_ref.clone(), r))
            .collect();
        for (session_ref, live) in self.live.lock().iter() {
            if live.workspace == workspace.root() {
                by_ref.insert(session_ref.clone(), live.record.clone());
            }
        }

        let mut records: Vec<SessionRecord> = by_ref
            .into_values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.run_id.as_ref().map_or(true, |id| &r.run_id == id))
            .filter(|r| {
                filter
                    .project_id
                    .as_ref()
                    .map_or(true, |id| &r.project_id == id)
            })
            .collect();
        records.sort_by(|a, b| a.session_ref.cmp(&b.session_ref));
        records
    }

    /// Wait until the session reaches a terminal status, stopping it when
    /// `timeout` elapses first (terminal status `failed`, "timed out").
    pub async fn wait_terminal(
        &self,
        workspace: &WorkspacePaths,
        session_ref: &SessionRef,
        timeout: Duration,
    ) -> Result<SessionPoll, EngineError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let poll = self.poll_session(workspace, session_ref)?;
            if poll.status.is_terminal() {
                return Ok(poll);
            }
            if tokio::time::Instant::now() >= deadline {
                if let Some(poll) = self
                    .stop_live_with_intent(session_ref, StopIntent::Timeout)
                    .await?
                {
                    return Ok(poll);
                }
                // Detached: stop via the persisted pid, then mark timed out
                let stopped = self.stop_session(workspace, session_ref).await?;
                let Some(mut record) = self.sessions.load(workspace, session_ref)? else {
                    return Err(EngineError::SessionNotFound(session_ref.to_string()));
                };
                if stopped.status.is_terminal() {
                    record.status = RunStatus::Failed;
                    record.error = Some("timed out".to_string());
                    self.persist_reconciled(workspace, &record);
                }
                return Ok(poll_of(&record));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Terminate a live session and wait for its waiter to settle.
    /// Returns `None` when the session is not in the in-memory table.
    async fn stop_live_with_intent(
        &self,
        session_ref: &SessionRef,
        intent: StopIntent,
    ) -> Result<Option<SessionPoll>, EngineError> {
        let live_pid = {
            let mut live = self.live.lock();
            match live.get_mut(session_ref) {
                Some(session) if !session.record.is_terminal() => {
                    session.intent = intent;
                    session.record.pid
                }
                Some(session) => return Ok(Some(poll_of(&session.record))),
                None => return Ok(None),
            }
        };

        if let Some(pid) = live_pid {
            terminate_with_grace(pid).await;
        }
        // The waiter task records the terminal state; poll until it does
        let deadline = tokio::time::Instant::now() + STOP_GRACE + Duration::from_secs(3);
        loop {
            if let Some(live) = self.live.lock().get(session_ref) {
                if live.record.is_terminal() {
                    return Ok(Some(poll_of(&live.record)));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::WorkerLaunchFailed(
                    "stop did not settle".to_string(),
                ));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    // -- internals --

    async fn ensure_run_record(
        &self,
        paths: &WorkspacePaths,
        spec: &LaunchSpec,
    ) -> Result<(), EngineError> {
        let run_yaml = paths.run_yaml(&spec.project_id, &spec.run_id);
        if self.store.path_exists(&run_yaml) {
            return Ok(());
        }
        let record = RunRecord::new(
            spec.run_id.clone(),
            spec.provider.clone(),
            spec.agent_id.clone(),
            spec.project_id.clone(),
        );
        self.store
            .write_yaml(&run_yaml, &record, WriteOpts::default())
            .await?;
        Ok(())
    }

    async fn fail_preflight(
        &self,
        paths: &WorkspacePaths,
        spec: &LaunchSpec,
        session_ref: &SessionRef,
        reason: &str,
    ) -> Result<(), EngineError> {
        self.set_run_terminal(
            paths,
            &spec.project_id,
            &spec.run_id,
            RunStatus::Failed,
            None,
            Some(reason),
        )
        .await?;
        let events_path = paths.events_path(&spec.project_id, &spec.run_id);
        self.event_log
            .append(
                &events_path,
                &spec.run_id,
                session_ref,
                EventDraft::run_failed(reason, true),
            )
            .await?;
        Ok(())
    }

    async fn fail_spawn(
        &self,
        paths: &WorkspacePaths,
        spec: &LaunchSpec,
        session_ref: &SessionRef,
        message: &str,
    ) -> Result<(), EngineError> {
        self.set_run_terminal(
            paths,
            &spec.project_id,
            &spec.run_id,
            RunStatus::Failed,
            None,
            Some(message),
        )
        .await?;
        let events_path = paths.events_path(&spec.project_id, &spec.run_id);
        self.event_log
            .append(
                &events_path,
                &spec.run_id,
                session_ref,
                EventDraft::run_failed(message, false),
            )
            .await?;
        Ok(())
    }

    async fn set_run_terminal(
        &self,
        paths: &WorkspacePaths,
        project_id: &ProjectId,
        run_id: &RunId,
        status: RunStatus,
        exit_code: Option<i32>,
        error: Option<&str>,
    ) -> Result<(), EngineError> {
        let run_yaml = paths.run_yaml(project_id, run_id);
        let mut record: RunRecord = self.store.read_yaml(&run_yaml)?;
        if record.finish(status) {
            record.exit_code = exit_code;
            if let Some(error) = error {
                record.error = Some(error.to_string());
            }
            self.store
                .write_yaml(&run_yaml, &record, WriteOpts::default())
                .await?;
        }
        Ok(())
    }

    /// Persist a reconciled record and mirror the status into `run.yaml`.
    /// Best-effort from sync contexts (poll does not suspend).
    fn persist_reconciled(&self, workspace: &WorkspacePaths, record: &SessionRecord) {
        let record_path = workspace.session_record_path(&record.session_ref);
        if let Ok(yaml) = serde_yaml::to_string(record) {
            if let Err(e) = atomic_write_sync(&record_path, yaml.as_bytes()) {
                tracing::warn!(error = %e, "failed to persist reconciled session record");
            }
        }

        let run_yaml = workspace.run_yaml(&record.project_id, &record.run_id);
        let Ok(text) = std::fs::read_to_string(&run_yaml) else {
            return;
        };
        let parsed: Result<RunRecord, _> = serde_yaml::from_str(&text);
        let Ok(mut run) = parsed else {
            return;
        };
        if run.finish(record.status) {
            run.exit_code = record.exit_code;
            run.error = record.error.clone();
            if let Ok(yaml) = serde_yaml::to_string(&run) {
                if let Err(e) = atomic_write_sync(&run_yaml, yaml.as_bytes()) {
                    tracing::warn!(error = %e, "failed to persist reconciled run record");
                }
            }
        }
    }

    /// Background task that observes child exit and finalizes everything.
    fn spawn_waiter(&self, session_ref: SessionRef, mut child: tokio::process::Child) {
        let manager = self.clone();
        tokio::spawn(async move {
            let wait_result = child.wait().await;

            let (workspace, mut record, intent) = {
                let live = manager.live.lock();
                let Some(session) = live.get(&session_ref) else {
                    return;
                };
                (
                    session.workspace.clone(),
                    session.record.clone(),
                    session.intent,
                )
            };
            let paths = WorkspacePaths::new(&workspace);

            match wait_result {
                Ok(status) => {
                    use std::os::unix::process::ExitStatusExt;
                    record.ended_at_ms = Some(manager.clock.epoch_ms());
                    match intent {
                        StopIntent::Stop => {
                            record.status = RunStatus::Stopped;
                            record.signal = status.signal().map(|s| format!("signal {s}"));
                        }
                        StopIntent::Timeout => {
                            record.status = RunStatus::Failed;
                            record.signal = status.signal().map(|s| format!("signal {s}"));
                            record.error = Some("timed out".to_string());
                        }
                        StopIntent::None => {
                            if let Some(code) = status.code() {
                                record.status = RunStatus::Ended;
                                record.exit_code = Some(code);
                            } else {
                                record.status = RunStatus::Failed;
                                record.signal = status.signal().map(|s| format!("signal {s}"));
                                record.error = Some("terminated by signal".to_string());
                            }
                        }
                    }
                }
                Err(e) => {
                    record.status = RunStatus::Failed;
                    record.error = Some(format!("wait failed: {e}"));
                    record.ended_at_ms = Some(manager.clock.epoch_ms());
                }
            }

            if let Err(e) = manager.sessions.save(&paths, &record).await {
                tracing::warn!(error = %e, "failed to save terminal session record");
            }
            let _ = manager
                .set_run_terminal(
                    &paths,
                    &record.project_id,
                    &record.run_id,
                    record.status,
                    record.exit_code,
                    record.error.as_deref(),
                )
                .await;

            let events_path = paths.events_path(&record.project_id, &record.run_id);
            let draft = match record.status {
                RunStatus::Ended => EventDraft::run_ended(record.exit_code.unwrap_or_default()),
                RunStatus::Stopped => EventDraft::run_stopped("stopped by caller"),
                _ => EventDraft::run_failed(
                    record.error.as_deref().unwrap_or("process failed"),
                    false,
                ),
            };
            if let Err(e) = manager
                .event_log
                .append(&events_path, &record.run_id, &session_ref, draft)
                .await
            {
                tracing::warn!(error = %e, "failed to append terminal run event");
            }

            if let Some(live) = manager.live.lock().get_mut(&session_ref) {
                live.record = record;
            }
        });
    }
}

fn poll_of(record: &SessionRecord) -> SessionPoll {
    SessionPoll {
        status: record.status,
        exit_code: record.exit_code,
        signal: record.signal.clone(),
        error: record.error.clone(),
    }
}

fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(pid), None).is_ok()
}

/// SIGTERM, wait out the grace period, then SIGKILL if still alive.
async fn terminate_with_grace(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else { return };
    let target = Pid::from_raw(raw);
    let _ = kill(target, Signal::SIGTERM);

    let deadline = tokio::time::Instant::now() + STOP_GRACE;
    while tokio::time::Instant::now() < deadline {
        if kill(target, None).is_err() {
            return;
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
    let _ = kill(target, Signal::SIGKILL);
}

/// Minimal sync atomic write for reconciliation paths.
fn atomic_write_sync(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let tmp = path.with_extension("yaml.tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
