// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launch lane scheduler.
//!
//! An in-process multi-dimensional admission queue keyed by workspace
//! directory. Each drain pass enumerates queued jobs in (priority,
//! insertion-id) order and admits the earliest job whose workspace,
//! provider, and team running counts are all under their limits and whose
//! provider is not cooling down. Strict priority across classes, FIFO
//! within a class, no lower-dimension starvation.
//!
//! Provider backpressure applies exponential cooldowns with jitter; the
//! queue resumes automatically when the earliest active cooldown expires.

use ac_core::{Clock, Priority, TeamId};
use parking_lot::Mutex as SyncMutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::env;
use crate::error::EngineError;

/// Default maximum cooldown (1 hour) unless the class caps lower.
const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Highest backoff level; cooldowns stop growing here.
const MAX_BACKOFF_LEVEL: u32 = 6;

/// Jitter applied to every cooldown unless overridden.
const DEFAULT_JITTER_PCT: f64 = 0.10;

/// Cooldowns never shrink below this floor.
const MIN_COOLDOWN: Duration = Duration::from_secs(1);

/// Why a provider is backing off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressureClass {
    RateLimit,
    Transient,
    Interactive,
    Auth,
}

impl BackpressureClass {
    fn base(&self) -> Duration {
        match self {
            BackpressureClass::RateLimit => Duration::from_secs(5 * 60),
            BackpressureClass::Transient => Duration::from_secs(60),
            BackpressureClass::Interactive => Duration::from_secs(2 * 60),
            BackpressureClass::Auth => Duration::from_secs(30 * 60),
        }
    }

    /// Auth does not escalate; re-authentication is a human action.
    fn level_cap(&self) -> u32 {
        match self {
            BackpressureClass::Auth => 1,
            _ => MAX_BACKOFF_LEVEL,
        }
    }

    /// Auth also caps the cooldown at its own base.
    fn caps_at_base(&self) -> bool {
        matches!(self, BackpressureClass::Auth)
    }
}

/// Optional overrides for one backpressure report.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackpressureOpts {
    pub base_cooldown_ms: Option<u64>,
    pub max_cooldown_ms: Option<u64>,
    pub jitter_pct: Option<f64>,
}

/// One job's admission inputs.
#[derive(Debug, Clone)]
pub struct LaneJob {
    pub provider: String,
    pub team_id: Option<TeamId>,
    pub priority: Priority,
    /// Per-job limit overrides; environment defaults otherwise.
    pub workspace_limit: Option<usize>,
    pub provider_limit: Option<usize>,
    pub team_limit: Option<usize>,
}

impl LaneJob {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            team_id: None,
            priority: Priority::Normal,
            workspace_limit: None,
            provider_limit: None,
            team_limit: None,
        }
    }
}

/// Queue and running-count stats for one workspace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneStats {
    pub queued_by_priority: BTreeMap<String, usize>,
    pub running_by_provider: BTreeMap<String, usize>,
    pub running_by_team: BTreeMap<String, usize>,
    /// Remaining cooldown per provider.
    pub cooldowns: BTreeMap<String, Duration>,
}

struct QueuedJob {
    id: u64,
    job: LaneJob,
    workspace_limit: usize,
    provider_limit: usize,
    team_limit: usize,
    permit_tx: oneshot::Sender<()>,
}

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    until: Instant,
    level: u32,
}

#[derive(Default)]
struct WorkspaceLane {
    next_id: u64,
    queue: Vec<QueuedJob>,
    running_total: usize,
    running_by_provider: HashMap<String, usize>,
    running_by_team: HashMap<String, usize>,
    cooldowns: HashMap<String, Cooldown>,
    timer_armed: bool,
}

/// The scheduler. Cheap to clone; clones share all lane state.
#[derive(Clone)]
pub struct LaunchLanes<C: Clock> {
    clock: C,
    lanes: Arc<SyncMutex<HashMap<PathBuf, WorkspaceLane>>>,
}

/// Held while an admitted job runs; releases its slots on drop, even when
/// the job's future panics or is aborted.
pub struct LaneGuard<C: Clock + 'static> {
    lanes: LaunchLanes<C>,
    workspace: PathBuf,
    provider: String,
    team: Option<String>,
}

impl<C: Clock + 'static> std::fmt::Debug for LaneGuard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaneGuard")
            .field("workspace", &self.workspace)
            .field("provider", &self.provider)
            .field("team", &self.team)
            .finish()
    }
}

impl<C: Clock + 'static> Drop for LaneGuard<C> {
    fn drop(&mut self) {
        self.lanes
            .release(&self.workspace, &self.provider, self.team.as_deref());
    }
}

impl<C: Clock + 'static> LaunchLanes<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            lanes: Arc::new(SyncMutex::new(HashMap::new())),
        }
    }

    /// Wait until the job is admitted. Dropping the returned future before
    /// admission withdraws the job from the queue.
    pub async fn admit(&self, workspace: &Path, job: LaneJob) -> Result<LaneGuard<C>, EngineError> {
        let provider = job.provider.clone();
        let team = job.team_id.as_ref().map(|t| t.to_string());
        let (_id, rx) = self.enqueue(workspace, job);
        self.drain(workspace);

        match rx.await {
            Ok(()) => Ok(LaneGuard {
                lanes: self.clone(),
                workspace: workspace.to_path_buf(),
                provider,
                team,
            }),
            Err(_) => Err(EngineError::LaneCanceled),
        }
    }

    /// `admit` with a deadline; expiry withdraws the job and returns
    /// `lane_timeout`.
    pub async fn admit_timeout(
        &self,
        workspace: &Path,
        job: LaneJob,
        timeout: Duration,
    ) -> Result<LaneGuard<C>, EngineError> {
        let provider = job.provider.clone();
        let team = job.team_id.as_ref().map(|t| t.to_string());
        let (id, rx) = self.enqueue(workspace, job);
        self.drain(workspace);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => Ok(LaneGuard {
                lanes: self.clone(),
                workspace: workspace.to_path_buf(),
                provider,
                team,
            }),
            Ok(Err(_)) => Err(EngineError::LaneCanceled),
            Err(_elapsed) => {
                // If admission raced the deadline, give the slot back.
                if !self.withdraw(workspace, id) {
                    self.release(workspace, &provider, team.as_deref());
                }
                Err(EngineError::LaneTimeout)
            }
        }
    }

    /// Cancel a queued job by id. True when the job was still queued.
    pub fn cancel(&self, workspace: &Path, id: u64) -> bool {
        let withdrawn = self.withdraw(workspace, id);
        if withdrawn {
            self.drain(workspace);
        }
        withdrawn
    }

    /// Record provider backpressure; returns the applied cooldown.
    pub fn report_provider_backpressure(
        &self,
        workspace: &Path,
        provider: &str,
        class: BackpressureClass,
        opts: BackpressureOpts,
    ) -> Duration {
        let now = self.clock.now();
        let base = opts
            .base_cooldown_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| class.base());
        let mut max = opts
            .max_cooldown_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_COOLDOWN);
        if class.caps_at_base() {
            max = max.min(base);
        }

        let cooldown = {
            let mut lanes = self.lanes.lock();
            let lane = lanes.entry(workspace.to_path_buf()).or_default();

            // Escalate only while a previous cooldown is still active
            let level = match lane.cooldowns.get(provider) {
                Some(active) if active.until > now => {
                    (active.level + 1).min(class.level_cap())
                }
                _ => 1,
            };

            let exponent = level.saturating_sub(1).min(31);
            let raw = base
                .checked_mul(1u32 << exponent)
                .unwrap_or(DEFAULT_MAX_COOLDOWN)
                .min(max);

            let jitter_pct = opts.jitter_pct.unwrap_or(DEFAULT_JITTER_PCT).clamp(0.0, 1.0);
            let factor = 1.0 + rand::rng().random_range(-jitter_pct..=jitter_pct);
            let jittered =
                Duration::from_secs_f64((raw.as_secs_f64() * factor).max(MIN_COOLDOWN.as_secs_f64()));

            lane.cooldowns.insert(
                provider.to_string(),
                Cooldown {
                    until: now + jittered,
                    level,
                },
            );
            tracing::info!(
                workspace = %workspace.display(),
                provider,
                level,
                cooldown_ms = jittered.as_millis() as u64,
                "provider cooldown applied"
            );
            jittered
        };

        // Re-arm the wake timer around the new expiry set
        self.drain(workspace);
        cooldown
    }

    pub fn clear_provider_cooldown(&self, workspace: &Path, provider: &str) {
        {
            let mut lanes = self.lanes.lock();
            if let Some(lane) = lanes.get_mut(workspace) {
                lane.cooldowns.remove(provider);
            }
        }
        self.drain(workspace);
    }

    pub fn read_launch_lane_stats(&self, workspace: &Path) -> LaneStats {
        let now = self.clock.now();
        let lanes = self.lanes.lock();
        let Some(lane) = lanes.get(workspace) else {
            return LaneStats::default();
        };

        let mut stats = LaneStats::default();
        for queued in &lane.queue {
            let key = match queued.job.priority {
                Priority::High => "high",
                Priority::Normal => "normal",
                Priority::Low => "low",
            };
            *stats.queued_by_priority.entry(key.to_string()).or_default() += 1;
        }
        for (provider, count) in &lane.running_by_provider {
            if *count > 0 {
                stats
                    .running_by_provider
                    .insert(provider.clone(), *count);
            }
        }
        for (team, count) in &lane.running_by_team {
            if *count > 0 {
                stats.running_by_team.insert(team.clone(), *count);
            }
        }
        for (provider, cooldown) in &lane.cooldowns {
            if cooldown.until > now {
                stats
                    .cooldowns
                    .insert(provider.clone(), cooldown.until - now);
            }
        }
        stats
    }

    /// Drop every lane. Test hook mirroring the event log's reset.
    pub fn reset_for_tests(&self) {
        self.lanes.lock().clear();
    }

    fn enqueue(&self, workspace: &Path, job: LaneJob) -> (u64, oneshot::Receiver<()>) {
        let workspace_limit = job.workspace_limit.unwrap_or_else(env::workspace_limit).max(1);
        let provider_limit = job.provider_limit.unwrap_or_else(env::provider_limit).max(1);
        let team_limit = job.team_limit.unwrap_or_else(env::team_limit).max(1);

        let (permit_tx, rx) = oneshot::channel();
        let mut lanes = self.lanes.lock();
        let lane = lanes.entry(workspace.to_path_buf()).or_default();
        lane.next_id += 1;
        let id = lane.next_id;
        lane.queue.push(QueuedJob {
            id,
            job,
            workspace_limit,
            provider_limit,
            team_limit,
            permit_tx,
        });
        (id, rx)
    }

    /// Remove a queued entry by id. False when it was already admitted.
    fn withdraw(&self, workspace: &Path, id: u64) -> bool {
        let mut lanes = self.lanes.lock();
        let Some(lane) = lanes.get_mut(workspace) else {
            return false;
        };
        let before = lane.queue.len();
        lane.queue.retain(|q| q.id != id);
        lane.queue.len() != before
    }

    fn release(&self, workspace: &Path, provider: &str, team: Option<&str>) {
        {
            let mut lanes = self.lanes.lock();
            if let Some(lane) = lanes.get_mut(workspace) {
                lane.running_total = lane.running_total.saturating_sub(1);
                if let Some(count) = lane.running_by_provider.get_mut(provider) {
                    *count = count.saturating_sub(1);
                }
                if let Some(team) = team {
                    if let Some(count) = lane.running_by_team.get_mut(team) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
        self.drain(workspace);
    }

    /// One scheduling pass. Admits every currently-runnable job, then arms
    /// a single wake timer for the earliest cooldown if work remains.
    fn drain(&self, workspace: &Path) {
        let now = self.clock.now();
        let mut arm_at: Option<Instant> = None;

        {
            let mut lanes = self.lanes.lock();
            let Some(lane) = lanes.get_mut(workspace) else {
                return;
            };
            lane.cooldowns.retain(|_, c| c.until > now);

            loop {
                // (priority, insertion-id) order over the current queue
                let mut order: Vec<(Priority, u64, usize)> = lane
                    .queue
                    .iter()
                    .enumerate()
                    .map(|(index, q)| (q.job.priority, q.id, index))
                    .collect();
                order.sort();

                let mut admitted_index = None;
                for (_, _, index) in &order {
                    let queued = &lane.queue[*index];
                    if lane.running_total >= queued.workspace_limit {
                        continue;
                    }
                    let provider_running = lane
                        .running_by_provider
                        .get(&queued.job.provider)
                        .copied()
                        .unwrap_or(0);
                    if provider_running >= queued.provider_limit {
                        continue;
                    }
                    if let Some(team) = &queued.job.team_id {
                        let team_running = lane
                            .running_by_team
                            .get(team.as_str())
                            .copied()
                            .unwrap_or(0);
                        if team_running >= queued.team_limit {
                            continue;
                        }
                    }
                    if lane.cooldowns.contains_key(&queued.job.provider) {
                        continue;
                    }
                    admitted_index = Some(*index);
                    break;
                }

                let Some(index) = admitted_index else { break };
                let queued = lane.queue.remove(index);
                let team_key = queued.job.team_id.as_ref().map(|t| t.to_string());
                if queued.permit_tx.send(()).is_err() {
                    // Caller abandoned the admission; slot stays free
                    continue;
                }
                lane.running_total += 1;
                *lane
                    .running_by_provider
                    .entry(queued.job.provider.clone())
                    .or_default() += 1;
                if let Some(team) = team_key {
                    *lane.running_by_team.entry(team).or_default() += 1;
                }
            }

            if !lane.queue.is_empty() && !lane.timer_armed {
                if let Some(earliest) = lane.cooldowns.values().map(|c| c.until).min() {
                    lane.timer_armed = true;
                    arm_at = Some(earliest);
                }
            }
        }

        if let Some(deadline) = arm_at {
            // Drains may run from Drop impls outside a runtime; skip the
            // timer there (the next submission or release re-arms it).
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                let mut map = self.lanes.lock();
                if let Some(lane) = map.get_mut(workspace) {
                    lane.timer_armed = false;
                }
                return;
            };
            let lanes = self.clone();
            let workspace = workspace.to_path_buf();
            let wait = deadline.saturating_duration_since(now);
            handle.spawn(async move {
                tokio::time::sleep(wait).await;
                {
                    let mut map = lanes.lanes.lock();
                    if let Some(lane) = map.get_mut(&workspace) {
                        lane.timer_armed = false;
                    }
                }
                lanes.drain(&workspace);
            });
        }
    }
}

#[cfg(test)]
#[path = "lane_tests.rs"]
mod tests;
