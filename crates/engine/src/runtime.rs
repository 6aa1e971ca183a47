// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine runtime handle.
//!
//! All process-wide state (session table, event-log hash cache, launch
//! lanes, heartbeat loops) hangs off one `EngineRuntime` so tests can
//! instantiate many concurrent workspaces and reset between cases. One
//! runtime serves any number of workspaces.

use ac_adapters::{AuthProbe, CliAuthProbe, PricingTable, ResultContractMode};
use ac_core::{Actor, Clock, HeartbeatReport, JobSpec, SystemClock};
use ac_storage::{EventBus, EventLog, HeartbeatStore, SessionStore, Store};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;
use crate::heartbeat::{parse_heartbeat_report, HeartbeatJobRunner, HeartbeatScheduler};
use crate::lane::{LaneJob, LaunchLanes};
use crate::sessions::SessionManager;
use crate::worker::{AttemptSpec, WorkerRunner};

/// Everything the kernel needs, wired together.
#[derive(Clone)]
pub struct EngineRuntime<C: Clock + 'static> {
    store: Store,
    bus: EventBus,
    event_log: EventLog<C>,
    sessions: SessionManager<C>,
    lanes: LaunchLanes<C>,
    worker: WorkerRunner<C>,
    heartbeat: HeartbeatScheduler<C>,
    heartbeat_store: HeartbeatStore,
}

impl EngineRuntime<SystemClock> {
    /// Production wiring: system clock, real auth probes.
    pub fn new() -> Self {
        Self::with_clock_and_probe(SystemClock, Arc::new(CliAuthProbe))
    }
}

impl Default for EngineRuntime<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + 'static> EngineRuntime<C> {
    pub fn with_clock_and_probe(clock: C, probe: Arc<dyn AuthProbe>) -> Self {
        let store = Store::new();
        let bus = EventBus::new();
        let event_log = EventLog::new(store.clone(), bus.clone(), clock.clone());
        let session_store = SessionStore::new(store.clone());
        let sessions = SessionManager::new(
            clock.clone(),
            store.clone(),
            session_store,
            event_log.clone(),
        );
        let lanes = LaunchLanes::new(clock.clone());
        let worker = WorkerRunner::new(
            store.clone(),
            sessions.clone(),
            event_log.clone(),
            PricingTable::builtin(),
            probe,
        );
        let heartbeat_store = HeartbeatStore::new(store.clone());
        let job_runner = Arc::new(LaneJobRunner {
            lanes: lanes.clone(),
            worker: worker.clone(),
        });
        let heartbeat = HeartbeatScheduler::new(
            clock.clone(),
            store.clone(),
            heartbeat_store.clone(),
            event_log.clone(),
            job_runner,
        );

        Self {
            store,
            bus,
            event_log,
            sessions,
            lanes,
            worker,
            heartbeat,
            heartbeat_store,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn event_log(&self) -> &EventLog<C> {
        &self.event_log
    }

    pub fn sessions(&self) -> &SessionManager<C> {
        &self.sessions
    }

    pub fn lanes(&self) -> &LaunchLanes<C> {
        &self.lanes
    }

    pub fn worker(&self) -> &WorkerRunner<C> {
        &self.worker
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler<C> {
        &self.heartbeat
    }

    pub fn heartbeat_store(&self) -> &HeartbeatStore {
        &self.heartbeat_store
    }

    /// Drop every piece of process-wide state: the last-hash cache, the
    /// per-path queues, the session table, lane queues, and heartbeat
    /// loops. Equivalent to a control-plane restart.
    pub fn reset_for_tests(&self) {
        self.event_log.reset_for_tests();
        self.sessions.reset_for_tests();
        self.lanes.reset_for_tests();
        self.heartbeat.reset_for_tests();
    }
}

/// Production heartbeat runner: admission through the launch lane, then
/// one worker attempt, then report parsing.
struct LaneJobRunner<C: Clock + 'static> {
    lanes: LaunchLanes<C>,
    worker: WorkerRunner<C>,
}

#[async_trait]
impl<C: Clock + 'static> HeartbeatJobRunner for LaneJobRunner<C> {
    async fn run_heartbeat_job(
        &self,
        workspace_dir: &Path,
        job: JobSpec,
        prompt: String,
        timeout: Duration,
    ) -> Result<HeartbeatReport, EngineError> {
        let lane_job = LaneJob {
            provider: job.provider.clone(),
            team_id: job.team_id.clone(),
            priority: job.priority,
            workspace_limit: None,
            provider_limit: None,
            team_limit: None,
        };
        let _guard = self.lanes.admit_timeout(workspace_dir, lane_job, timeout).await?;

        let actor = Actor::new(job.manager_actor_id.clone(), job.manager_role);
        let outcome = self
            .worker
            .run_worker_attempt(
                workspace_dir,
                AttemptSpec {
                    prompt,
                    attempt: 1,
                    mode: ResultContractMode::PromptOnly,
                    worker_bin: None,
                    launcher_template: None,
                    timeout: Some(timeout),
                    actor,
                    task_id: None,
                    abort: None,
                    job,
                },
            )
            .await?;

        parse_heartbeat_report(&outcome.raw_output).map_err(EngineError::SchemaInvalid)
    }

    async fn launch_execution_job(
        &self,
        workspace_dir: &Path,
        job: JobSpec,
    ) -> Result<(), EngineError> {
        let lanes = self.lanes.clone();
        let worker = self.worker.clone();
        let workspace = workspace_dir.to_path_buf();
        tokio::spawn(async move {
            let lane_job = LaneJob {
                provider: job.provider.clone(),
                team_id: job.team_id.clone(),
                priority: job.priority,
                workspace_limit: None,
                provider_limit: None,
                team_limit: None,
            };
            let Ok(_guard) = lanes.admit(&workspace, lane_job).await else {
                tracing::warn!(job_id = %job.id, "auto-action job canceled in lane");
                return;
            };
            let actor = Actor::new(job.manager_actor_id.clone(), job.manager_role);
            let attempt = AttemptSpec {
                prompt: job.goal.clone(),
                attempt: 1,
                mode: ResultContractMode::PromptOnly,
                worker_bin: None,
                launcher_template: None,
                timeout: None,
                actor,
                task_id: None,
                abort: None,
                job,
            };
            if let Err(e) = worker.run_worker_attempt(&workspace, attempt).await {
                tracing::warn!(error = %e, "auto-action job failed");
            }
        });
        Ok(())
    }
}
