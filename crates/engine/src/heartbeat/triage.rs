// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat triage: who is worth waking this tick.
//!
//! Candidates are the workspace's worker agents. Each gets a wake score
//! from its input counts (new inbox signals, due tasks, overdue tasks,
//! stuck jobs); suppression windows and unchanged context hashes drop
//! candidates before the top-K cut.

use ac_core::{AgentId, HeartbeatConfig, HeartbeatState, ProjectId, Role};
use ac_storage::WorkspacePaths;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Runs older than this with no terminal status count as stuck.
const STUCK_AFTER_MS: u64 = 30 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSignals {
    pub new_signals: u32,
    pub due_tasks: u32,
    pub overdue_tasks: u32,
    pub stuck_jobs: u32,
}

impl WorkerSignals {
    /// Overdue work and stuck jobs weigh heavier than fresh chatter.
    pub fn score(&self) -> u32 {
        2 * self.new_signals + self.due_tasks + 3 * self.overdue_tasks + 2 * self.stuck_jobs
    }
}

#[derive(Debug, Clone)]
pub struct WorkerCandidate {
    pub agent_id: AgentId,
    pub role: Role,
    /// Project most implicated by the signals; used for heartbeat runs
    /// and approval proposals.
    pub project_id: Option<ProjectId>,
    pub signals: WorkerSignals,
    pub score: u32,
    pub context_hash: String,
}

#[derive(Debug, Deserialize)]
struct AgentYaml {
    role: Role,
}

#[derive(Debug, Deserialize)]
struct TaskFrontMatter {
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InboxSignal {
    #[serde(default)]
    target_agent_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Build the selected wake set for this tick.
pub fn triage(
    paths: &WorkspacePaths,
    config: &HeartbeatConfig,
    state: &HeartbeatState,
    now_iso: &str,
    now_epoch_ms: u64,
) -> Vec<WorkerCandidate> {
    let today = now_iso.get(..10).and_then(|d| d.parse::<NaiveDate>().ok());
    let agents = list_agents(paths);

    let mut candidates = Vec::new();
    for (agent_id, role) in agents {
        if role != Role::Worker && role != Role::Director {
            continue;
        }

        let (signals, project_id) =
            collect_signals(paths, &agent_id, state, today, now_epoch_ms);
        let score = signals.score();
        let context_hash = hash_context(&agent_id, &signals);

        // Suppression window
        if let Some(entry) = state.suppression.get(agent_id.as_str()) {
            if let Some(until) = &entry.suppressed_until {
                if until.as_str() > now_iso {
                    continue;
                }
            }
            // Nothing changed since the last wake
            if entry.last_context_hash.as_deref() == Some(context_hash.as_str()) {
                continue;
            }
        }

        if score < config.min_wake_score {
            continue;
        }

        candidates.push(WorkerCandidate {
            agent_id,
            role,
            project_id,
            signals,
            score,
            context_hash,
        });
    }

    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    candidates.truncate(config.top_k_workers);
    candidates
}

fn list_agents(paths: &WorkspacePaths) -> Vec<(AgentId, Role)> {
    let agents_dir = paths.root().join("org/agents");
    let Ok(entries) = std::fs::read_dir(&agents_dir) else {
        return Vec::new();
    };
    let mut agents = Vec::new();
    for entry in entries.flatten() {
        let yaml_path = entry.path().join("agent.yaml");
        let Ok(text) = std::fs::read_to_string(&yaml_path) else {
            continue;
        };
        let Ok(parsed) = serde_yaml::from_str::<AgentYaml>(&text) else {
            tracing::warn!(path = %yaml_path.display(), "unreadable agent record");
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        agents.push((AgentId::new(name), parsed.role));
    }
    agents.sort_by(|a, b| a.0.cmp(&b.0));
    agents
}

fn collect_signals(
    paths: &WorkspacePaths,
    agent_id: &AgentId,
    state: &HeartbeatState,
    today: Option<NaiveDate>,
    now_epoch_ms: u64,
) -> (WorkerSignals, Option<ProjectId>) {
    let mut signals = WorkerSignals::default();
    let mut first_project: Option<ProjectId> = None;
    let mut implicated_project: Option<ProjectId> = None;

    // Task pressure across all projects
    let projects_dir = paths.root().join("work/projects");
    if let Ok(projects) = std::fs::read_dir(&projects_dir) {
        let mut project_names: Vec<_> = projects
            .flatten()
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        project_names.sort();

        for project_name in project_names {
            let project = ProjectId::new(&project_name);
            if first_project.is_none() {
                first_project = Some(project.clone());
            }
            let Ok(tasks) = std::fs::read_dir(paths.project_dir(&project).join("tasks")) else {
                continue;
            };
            let mut hits = 0u32;
            for task in tasks.flatten() {
                let Some(front) = read_front_matter::<TaskFrontMatter>(&task.path()) else {
                    continue;
                };
                if front.assigned_to.as_deref() != Some(agent_id.as_str()) {
                    continue;
                }
                if front.status.as_deref() == Some("done") {
                    continue;
                }
                let Some(due) = front.due.and_then(|d| d.parse::<NaiveDate>().ok()) else {
                    continue;
                };
                let Some(today) = today else { continue };
                if due < today {
                    signals.overdue_tasks += 1;
                    hits += 1;
                } else if due <= today + chrono::Days::new(1) {
                    signals.due_tasks += 1;
                    hits += 1;
                }
            }
            if hits > 0 && implicated_project.is_none() {
                implicated_project = Some(project);
            }
        }
    }
    let mut project_hint = implicated_project.or(first_project);

    // Inbox signals since the last tick
    for inbox in ["inbox/comments", "inbox/help_requests"] {
        let Ok(entries) = std::fs::read_dir(paths.root().join(inbox)) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(text) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let Ok(signal) = serde_yaml::from_str::<InboxSignal>(&text) else {
                continue;
            };
            if signal.target_agent_id.as_deref() != Some(agent_id.as_str()) {
                continue;
            }
            let is_new = match (&signal.created_at, &state.last_tick_at) {
                (Some(created), Some(last)) => created.as_str() > last.as_str(),
                _ => true,
            };
            if is_new {
                signals.new_signals += 1;
            }
        }
    }

    // Stuck jobs: long-running sessions whose run belongs to this agent
    let session_entries = std::fs::read_dir(paths.sessions_dir());
    if let Ok(entries) = session_entries {
        for entry in entries.flatten() {
            let Ok(text) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let Ok(record) = serde_yaml::from_str::<ac_storage::SessionRecord>(&text) else {
                continue;
            };
            if record.status.is_terminal() {
                continue;
            }
            if now_epoch_ms.saturating_sub(record.started_at_ms) < STUCK_AFTER_MS {
                continue;
            }
            let run_yaml = paths.run_yaml(&record.project_id, &record.run_id);
            let Ok(run_text) = std::fs::read_to_string(&run_yaml) else {
                continue;
            };
            let Ok(run) = serde_yaml::from_str::<ac_core::RunRecord>(&run_text) else {
                continue;
            };
            if run.agent_id.as_str() == agent_id.as_str() {
                signals.stuck_jobs += 1;
                if project_hint.is_none() {
                    project_hint = Some(record.project_id.clone());
                }
            }
        }
    }

    (signals, project_hint)
}

fn read_front_matter<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Option<T> {
    let text = std::fs::read_to_string(path).ok()?;
    let rest = text.strip_prefix("---\n")?;
    let (front, _) = rest.split_once("\n---\n")?;
    serde_yaml::from_str(front).ok()
}

/// Stable digest over what the worker would be woken about.
fn hash_context(agent_id: &AgentId, signals: &WorkerSignals) -> String {
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_str().as_bytes());
    hasher.update(signals.new_signals.to_le_bytes());
    hasher.update(signals.due_tasks.to_le_bytes());
    hasher.update(signals.overdue_tasks.to_le_bytes());
    hasher.update(signals.stuck_jobs.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// UTC ISO-8601 stamp for an epoch-ms value.
pub fn iso_from_epoch_ms(ms: u64) -> String {
    use chrono::TimeZone;
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
#[path = "triage_tests.rs"]
mod tests;
