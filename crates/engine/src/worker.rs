// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker adapter: one provider attempt, end to end.
//!
//! Creates the run, builds the provider command, proves the subscription,
//! records CLI provenance, launches through the session manager, and
//! normalizes whatever the worker printed into a `ResultSpec`. Bad worker
//! output never raises: after bounded strict-JSON repair retries the
//! attempt settles on the typed `needs_input` fallback.

use ac_adapters::{
    default_policy_for, driver_for, extract_candidates, run_with_timeout, verify, AuthProbe,
    CommandRequest, PricingTable, ResultContractMode, SubscriptionCheck, WorkerDriver,
    PROBE_TIMEOUT,
};
use ac_core::{
    Actor, Clock, ContextPackId, EventDraft, JobId, JobSpec, ResultSpec, RunId, RunRecord,
    RunStatus, RunUsage, SessionRef, TaskId, TeamId, UuidIdGen,
};
use ac_storage::{EventLog, Store, WorkspacePaths, WriteOpts};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::env;
use crate::error::EngineError;
use crate::policy::{PolicyAction, ResourceCtx};
use crate::sessions::{LaunchGates, LaunchSpec, SessionManager};

/// Bounded repair retries before the typed fallback.
const MAX_REPAIR_ATTEMPTS: u32 = 2;

/// Repair exchanges are short; they only restate JSON.
const REPAIR_TIMEOUT: Duration = Duration::from_secs(120);

/// The contract text included in repair prompts.
pub const RESULT_SPEC_SCHEMA: &str = r#"{
  "schema_version": 1,
  "type": "result",
  "job_id": "<expected job id>",
  "attempt_run_id": "<expected run id>",
  "status": "succeeded | needs_input | blocked | failed | canceled",
  "summary": "<one paragraph>",
  "files_changed": [], "commands_run": [], "artifacts": [],
  "next_actions": [], "errors": []
}"#;

/// Inputs for one worker attempt.
pub struct AttemptSpec {
    pub job: JobSpec,
    pub prompt: String,
    pub attempt: u32,
    pub mode: ResultContractMode,
    /// Resolved binary override; the driver default otherwise.
    pub worker_bin: Option<String>,
    pub launcher_template: Option<String>,
    pub timeout: Option<Duration>,
    pub actor: Actor,
    pub task_id: Option<TaskId>,
    /// Firing this cancels the attempt: the session is stopped and the
    /// result settles on `canceled`.
    pub abort: Option<tokio::sync::oneshot::Receiver<()>>,
}

/// What an attempt settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub run_id: RunId,
    pub context_pack_id: ContextPackId,
    pub session_status: RunStatus,
    pub result: ResultSpec,
    /// Raw collected text, before normalization. Heartbeat report parsing
    /// reads this.
    pub raw_output: String,
    pub blocked_reason: Option<String>,
}

/// Drives worker attempts. Clones share the session table and caches.
#[derive(Clone)]
pub struct WorkerRunner<C: Clock> {
    store: Store,
    sessions: SessionManager<C>,
    event_log: EventLog<C>,
    pricing: PricingTable,
    probe: Arc<dyn AuthProbe>,
    id_gen: UuidIdGen,
}

impl<C: Clock + 'static> WorkerRunner<C> {
    pub fn new(
        store: Store,
        sessions: SessionManager<C>,
        event_log: EventLog<C>,
        pricing: PricingTable,
        probe: Arc<dyn AuthProbe>,
    ) -> Self {
        Self {
            store,
            sessions,
            event_log,
            pricing,
            probe,
            id_gen: UuidIdGen,
        }
    }

    /// Run one attempt with the driver registered for the job's provider.
    pub async fn run_worker_attempt(
        &self,
        workspace_dir: &Path,
        spec: AttemptSpec,
    ) -> Result<AttemptOutcome, EngineError> {
        let driver = driver_for(&spec.job.provider)?;
        self.run_attempt_with_driver(workspace_dir, driver, spec).await
    }

    /// Run one attempt with an explicit driver (tests, custom providers).
    pub async fn run_attempt_with_driver(
        &self,
        workspace_dir: &Path,
        driver: &dyn WorkerDriver,
        mut spec: AttemptSpec,
    ) -> Result<AttemptOutcome, EngineError> {
        let paths = WorkspacePaths::new(workspace_dir);
        let run_id = RunId::fresh(&self.id_gen);
        let context_pack_id = ContextPackId::fresh(&self.id_gen);
        let session_ref = SessionRef::local(&run_id);
        let bin = spec
            .worker_bin
            .clone()
            .unwrap_or_else(|| driver.default_bin().to_string());

        // 1. Create the run record up front so every later path can mark it
        let mut record = RunRecord::new(
            run_id.clone(),
            spec.job.provider.clone(),
            spec.job.worker_agent_id.clone(),
            spec.job.project_id.clone(),
        );
        record.context_pack_id = Some(context_pack_id.clone());
        let run_yaml = paths.run_yaml(&spec.job.project_id, &run_id);
        self.store
            .write_yaml(&run_yaml, &record, WriteOpts::default())
            .await?;
        let outputs_dir = paths.outputs_dir(&spec.job.project_id, &run_id);
        std::fs::create_dir_all(&outputs_dir).map_err(ac_storage::StoreError::from)?;

        // 2. Subscription guard (None for unmanaged providers)
        let subscription = match default_policy_for(driver.provider()) {
            Some(policy) => Some(
                verify(
                    &policy,
                    &bin,
                    &ac_adapters::EnvSnapshot::from_process(),
                    self.probe.as_ref(),
                )
                .await,
            ),
            None => None,
        };

        // 3. Provenance probe; also decides whether provider_schema mode
        //    is actually available
        let provenance = probe_provenance(&bin).await;
        let mode = match spec.mode {
            ResultContractMode::ProviderSchema
                if driver.supports_output_schema(&provenance.help_text) =>
            {
                ResultContractMode::ProviderSchema
            }
            _ => ResultContractMode::PromptOnly,
        };

        // 4. Build the provider command
        let command = driver.build_command(&CommandRequest {
            bin: bin.clone(),
            prompt: spec.prompt.clone(),
            mode,
            schema_json: Some(RESULT_SPEC_SCHEMA.to_string()),
            launcher_template: spec.launcher_template.clone(),
        })?;

        // 5. Launch through the session manager with full preflight
        let worker_team = read_agent_team(&paths, spec.job.worker_agent_id.as_str());
        let launch = LaunchSpec {
            workspace_dir: workspace_dir.to_path_buf(),
            project_id: spec.job.project_id.clone(),
            run_id: run_id.clone(),
            provider: spec.job.provider.clone(),
            agent_id: spec.job.worker_agent_id.clone(),
            argv: command.argv,
            stdin_text: command.stdin_text,
            env: command.env,
            session_ref: Some(session_ref.clone()),
            actor: Some(spec.actor.clone()),
            gates: LaunchGates {
                policy: Some((
                    PolicyAction::LaunchWorker,
                    ResourceCtx {
                        worker_team,
                        target_team: spec.job.team_id.clone(),
                        ..ResourceCtx::default()
                    },
                )),
                budget: true,
                task_id: spec.task_id.clone(),
                subscription: subscription.clone(),
            },
        };

        match self.sessions.launch_session(launch).await {
            Ok(_) => {}
            Err(EngineError::SubscriptionUnverified { reason, .. }) => {
                // Blocked before spawn: record why and return the block
                self.set_blocked_reason(&run_yaml, "subscription_unverified")
                    .await?;
                let check = subscription.unwrap_or(SubscriptionCheck {
                    passed: false,
                    bin: bin.clone(),
                    strategy: "unknown".to_string(),
                    reason: reason.clone(),
                });
                return Ok(AttemptOutcome {
                    run_id: run_id.clone(),
                    context_pack_id,
                    session_status: RunStatus::Failed,
                    result: blocked_result(&spec.job.id, &run_id, &check.reason),
                    raw_output: String::new(),
                    blocked_reason: Some("subscription_unverified".to_string()),
                });
            }
            Err(other) => return Err(other),
        }

        // Provenance is only worth recording for launches that happened
        let events_path = paths.events_path(&spec.job.project_id, &run_id);
        self.event_log
            .append(
                &events_path,
                &run_id,
                &session_ref,
                EventDraft::cli_provenance(&bin, &provenance.version, &provenance.help_sha256)
                    .actor(spec.actor.id.clone()),
            )
            .await?;

        // 6. Wait for the session, bounded by the attempt timeout and the
        //    caller's abort signal
        let timeout = spec.timeout.unwrap_or_else(env::attempt_timeout);
        let poll = match spec.abort.take() {
            Some(abort) => {
                tokio::select! {
                    poll = self.sessions.wait_terminal(&paths, &session_ref, timeout) => poll?,
                    _ = abort => {
                        let _ = self.sessions.stop_session(&paths, &session_ref).await?;
                        return Ok(AttemptOutcome {
                            run_id: run_id.clone(),
                            context_pack_id,
                            session_status: RunStatus::Stopped,
                            result: canceled_result(&spec.job.id, &run_id),
                            raw_output: String::new(),
                            blocked_reason: None,
                        });
                    }
                }
            }
            None => {
                self.sessions
                    .wait_terminal(&paths, &session_ref, timeout)
                    .await?
            }
        };

        // 7. Collect raw text in output-preference order
        let raw = collect_raw_output(&outputs_dir, driver);

        // 8. Normalize, repairing a bounded number of times
        let result = self
            .normalize_with_repair(driver, &bin, &outputs_dir, &raw, &spec, &run_id)
            .await;

        // 9. Settle usage into the run record
        self.settle_usage(&run_yaml, driver, &spec, &raw).await?;

        Ok(AttemptOutcome {
            run_id,
            context_pack_id,
            session_status: poll.status,
            result,
            raw_output: raw,
            blocked_reason: None,
        })
    }

    async fn normalize_with_repair(
        &self,
        driver: &dyn WorkerDriver,
        bin: &str,
        outputs_dir: &Path,
        raw: &str,
        spec: &AttemptSpec,
        run_id: &RunId,
    ) -> ResultSpec {
        let mut issues = match normalize_output(raw, &spec.job.id, run_id) {
            Ok(result) => return result,
            Err(issues) => issues,
        };

        for attempt in 1..=MAX_REPAIR_ATTEMPTS {
            let prompt = repair_prompt(&issues, &spec.job.id, run_id);
            let Ok(command) = driver.build_command(&CommandRequest {
                bin: bin.to_string(),
                prompt,
                mode: ResultContractMode::PromptOnly,
                schema_json: Some(RESULT_SPEC_SCHEMA.to_string()),
                launcher_template: spec.launcher_template.clone(),
            }) else {
                break;
            };

            let stdout = match run_command_capture(&command, REPAIR_TIMEOUT).await {
                Ok(stdout) => stdout,
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "repair invocation failed");
                    break;
                }
            };
            let text = driver.extract_text(&stdout);
            let _ = std::fs::write(
                outputs_dir.join(format!("repair_attempt_{attempt}.txt")),
                &text,
            );

            match normalize_output(&text, &spec.job.id, run_id) {
                Ok(result) => return result,
                Err(next_issues) => issues = next_issues,
            }
        }

        ResultSpec::unparseable_fallback(spec.job.id.clone(), run_id.clone(), &issues.join("; "))
    }

    async fn set_blocked_reason(
        &self,
        run_yaml: &Path,
        reason: &str,
    ) -> Result<(), EngineError> {
        let mut record: RunRecord = self.store.read_yaml(run_yaml)?;
        record.blocked_reason = Some(reason.to_string());
        self.store
            .write_yaml(run_yaml, &record, WriteOpts::default())
            .await?;
        Ok(())
    }

    async fn settle_usage(
        &self,
        run_yaml: &Path,
        driver: &dyn WorkerDriver,
        spec: &AttemptSpec,
        raw: &str,
    ) -> Result<(), EngineError> {
        let mut usage = driver
            .extract_usage(raw)
            .unwrap_or_else(|| {
                RunUsage::estimated_from_chars(spec.prompt.len() as u64, raw.len() as u64)
            });
        self.pricing.price_usage(&spec.job.provider, &mut usage);

        let mut record: RunRecord = self.store.read_yaml(run_yaml)?;
        record.usage = Some(usage);
        self.store
            .write_yaml(run_yaml, &record, WriteOpts::default())
            .await?;
        Ok(())
    }
}

/// Spawn a built command, deliver its stdin payload, and capture stdout.
async fn run_command_capture(
    command: &ac_adapters::CommandSpec,
    timeout: Duration,
) -> Result<String, String> {
    let Some((program, args)) = command.argv.split_first() else {
        return Err("empty argv".to_string());
    };
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .stdin(if command.stdin_text.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::null()
        });
    for (key, value) in &command.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|e| format!("spawn failed: {e}"))?;
    if let Some(text) = &command.stdin_text {
        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            let _ = stdin.write_all(text.as_bytes()).await;
        }
    }
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| "timed out".to_string())?
        .map_err(|e| format!("wait failed: {e}"))?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Pick the first candidate that looks like a result and validates.
pub fn normalize_output(
    raw: &str,
    job_id: &JobId,
    run_id: &RunId,
) -> Result<ResultSpec, Vec<String>> {
    let mut last_issues = vec!["no result-shaped JSON found in worker output".to_string()];
    for candidate in extract_candidates(raw) {
        if !ResultSpec::looks_like_result(&candidate) {
            continue;
        }
        match ResultSpec::from_candidate(candidate, job_id, run_id) {
            Ok(result) => return Ok(result),
            Err(issues) => last_issues = issues,
        }
    }
    Err(last_issues)
}

/// The strict-JSON repair prompt sent back to a worker whose output did
/// not validate.
pub fn repair_prompt(issues: &[String], job_id: &JobId, run_id: &RunId) -> String {
    let mut prompt = String::from(
        "Your previous reply was not a valid result document. \
         Respond with ONLY one strict JSON object, no prose, no code fences.\n\nIssues:\n",
    );
    for issue in issues {
        prompt.push_str("- ");
        prompt.push_str(issue);
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nRequired shape:\n{RESULT_SPEC_SCHEMA}\n\nUse job_id {job_id:?} and attempt_run_id {run_id:?}.",
        job_id = job_id.as_str(),
        run_id = run_id.as_str(),
    ));
    prompt
}

fn canceled_result(job_id: &JobId, run_id: &RunId) -> ResultSpec {
    let mut result = ResultSpec::unparseable_fallback(
        job_id.clone(),
        run_id.clone(),
        "attempt canceled before completion",
    );
    result.status = ac_core::ResultStatus::Canceled;
    result.summary = "Attempt canceled by caller.".to_string();
    result.errors = vec![ac_core::ResultError {
        code: "canceled_by_caller".to_string(),
        message: Some("canceled by caller".to_string()),
    }];
    result
}

fn blocked_result(job_id: &JobId, run_id: &RunId, reason: &str) -> ResultSpec {
    let mut result = ResultSpec::unparseable_fallback(
        job_id.clone(),
        run_id.clone(),
        "launch blocked before the worker ran",
    );
    result.status = ac_core::ResultStatus::Blocked;
    result.summary = format!("Launch blocked: {reason}");
    result.errors = vec![ac_core::ResultError {
        code: "subscription_unverified".to_string(),
        message: Some(reason.to_string()),
    }];
    result
}

/// Read raw result text, preferring explicit result files over stdout.
fn collect_raw_output(outputs_dir: &Path, driver: &dyn WorkerDriver) -> String {
    for name in driver.preferred_outputs() {
        let path = outputs_dir.join(name);
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        if *name == "stdout.txt" || *name == "stderr.txt" {
            return driver.extract_text(&text);
        }
        return text;
    }
    String::new()
}

struct Provenance {
    version: String,
    help_text: String,
    help_sha256: String,
}

/// `--version` / `--help` probe; failures degrade to "unavailable".
async fn probe_provenance(bin: &str) -> Provenance {
    let version = {
        let mut cmd = tokio::process::Command::new(bin);
        cmd.arg("--version");
        match run_with_timeout(cmd, PROBE_TIMEOUT, "version probe").await {
            Ok(output) => String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string(),
            Err(_) => "unavailable".to_string(),
        }
    };

    let help_text = {
        let mut cmd = tokio::process::Command::new(bin);
        cmd.arg("--help");
        match run_with_timeout(cmd, PROBE_TIMEOUT, "help probe").await {
            Ok(output) => String::from_utf8_lossy(&output.stdout).to_string(),
            Err(_) => String::new(),
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(help_text.as_bytes());
    let help_sha256 = format!("{:x}", hasher.finalize());

    Provenance {
        version,
        help_text,
        help_sha256,
    }
}

#[derive(Debug, Deserialize)]
struct AgentRecordHeader {
    #[serde(default)]
    team_id: Option<TeamId>,
}

/// The worker's own team from `org/agents/<id>/agent.yaml`.
fn read_agent_team(paths: &WorkspacePaths, agent_id: &str) -> Option<TeamId> {
    let path = paths.agent_yaml(&ac_core::AgentId::new(agent_id));
    let text = std::fs::read_to_string(path).ok()?;
    serde_yaml::from_str::<AgentRecordHeader>(&text).ok()?.team_id
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
