// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-side projections over canonical files.
//!
//! Snapshots are pure: they read runs, events, artifacts, and session
//! records, and never mutate anything. External collaborators (UI, CLI,
//! desktop shim) consume these rows through the RPC surface.

use ac_core::{
    parse_artifact, AgentId, ArtifactKind, Clock, ProjectId, ReviewOutcome, Role, RunId, RunStatus,
    RunUsage, TeamId,
};
use ac_storage::{read_envelopes, verify_chain, WorkspacePaths};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::sessions::SessionManager;

/// One assembled run row.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub run_id: RunId,
    pub project_id: ProjectId,
    pub status: RunStatus,
    pub provider: String,
    pub agent_id: AgentId,
    pub usage: Option<RunUsage>,
    pub policy_event_count: usize,
    pub budget_event_count: usize,
    pub last_event_type: Option<String>,
    pub last_event_ts: Option<String>,
    /// Latest payload per event type, for typed summaries.
    pub latest_events: BTreeMap<String, serde_json::Value>,
    pub parse_error_count: usize,
    /// Live status from the session table, when a session is known.
    pub session_status: Option<RunStatus>,
}

/// Review-inbox projection for one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub artifact_id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub latest_decision: Option<ReviewOutcome>,
}

/// The review inbox as a whole.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewInbox {
    pub rows: Vec<ReviewRow>,
    pub parse_error_count: usize,
    /// `clean` or `parse_errors` — the aggregate health of the inbox.
    pub status: String,
}

/// Per-agent colleague row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColleagueRow {
    pub agent_id: AgentId,
    pub role: Role,
    pub team_id: Option<TeamId>,
    pub runs_total: usize,
    pub runs_running: usize,
    pub live_sessions: usize,
}

/// Assemble run rows for every run in every project.
pub fn run_rows<C: Clock + 'static>(
    paths: &WorkspacePaths,
    sessions: &SessionManager<C>,
) -> Vec<RunRow> {
    // A read-only view of session status: snapshots never reconcile
    let session_status_by_run: BTreeMap<RunId, RunStatus> = sessions
        .list_sessions(paths, &crate::sessions::SessionFilter::default())
        .into_iter()
        .map(|record| (record.run_id.clone(), record.status))
        .collect();

    let mut rows = Vec::new();
    for project_id in list_projects(paths) {
        let Ok(entries) = std::fs::read_dir(paths.runs_dir(&project_id)) else {
            continue;
        };
        for entry in entries.flatten() {
            let run_yaml = entry.path().join("run.yaml");
            let Ok(text) = std::fs::read_to_string(&run_yaml) else {
                continue;
            };
            let Ok(record) = serde_yaml::from_str::<ac_core::RunRecord>(&text) else {
                continue;
            };

            let events_path = paths.events_path(&project_id, &record.id);
            let envelopes = read_envelopes(&events_path);
            let chain = verify_chain(&events_path);

            let mut latest_events = BTreeMap::new();
            for envelope in &envelopes {
                latest_events.insert(envelope.event_type.clone(), envelope.payload.clone());
            }

            let session_status = session_status_by_run.get(&record.id).copied();

            rows.push(RunRow {
                run_id: record.id.clone(),
                project_id: project_id.clone(),
                status: record.status,
                provider: record.provider.clone(),
                agent_id: record.agent_id.clone(),
                usage: record.usage.clone(),
                policy_event_count: envelopes
                    .iter()
                    .filter(|e| e.event_type.starts_with("policy."))
                    .count(),
                budget_event_count: envelopes
                    .iter()
                    .filter(|e| e.event_type.starts_with("budget."))
                    .count(),
                last_event_type: envelopes.last().map(|e| e.event_type.clone()),
                last_event_ts: envelopes.last().map(|e| e.ts_wallclock.clone()),
                latest_events,
                parse_error_count: chain.parse_errors,
                session_status,
            });
        }
    }
    rows.sort_by(|a, b| a.run_id.cmp(&b.run_id));
    rows
}

/// Assemble the review inbox: latest decision per artifact plus
/// parse-error accounting.
pub fn review_inbox(paths: &WorkspacePaths) -> ReviewInbox {
    let mut inbox = ReviewInbox::default();
    for project_id in list_projects(paths) {
        let Ok(entries) = std::fs::read_dir(paths.artifacts_dir(&project_id)) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(text) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            match parse_artifact(&text) {
                Ok((header, _)) => inbox.rows.push(ReviewRow {
                    artifact_id: header.id.to_string(),
                    kind: header.kind,
                    title: header.title.clone(),
                    latest_decision: header.latest_review().map(|r| r.decision),
                }),
                Err(_) => inbox.parse_error_count += 1,
            }
        }
    }
    inbox.rows.sort_by(|a, b| a.artifact_id.cmp(&b.artifact_id));
    inbox.status = if inbox.parse_error_count == 0 {
        "clean".to_string()
    } else {
        "parse_errors".to_string()
    };
    inbox
}

#[derive(Deserialize)]
struct AgentYaml {
    role: Role,
    #[serde(default)]
    team_id: Option<TeamId>,
}

/// Per-agent counters joined with live session data.
pub fn colleagues<C: Clock + 'static>(
    paths: &WorkspacePaths,
    sessions: &SessionManager<C>,
) -> Vec<ColleagueRow> {
    // Gather run counts per agent first
    let mut runs_total: BTreeMap<String, usize> = BTreeMap::new();
    let mut runs_running: BTreeMap<String, usize> = BTreeMap::new();
    for project_id in list_projects(paths) {
        let Ok(entries) = std::fs::read_dir(paths.runs_dir(&project_id)) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(text) = std::fs::read_to_string(entry.path().join("run.yaml")) else {
                continue;
            };
            let Ok(record) = serde_yaml::from_str::<ac_core::RunRecord>(&text) else {
                continue;
            };
            *runs_total.entry(record.agent_id.to_string()).or_default() += 1;
            if record.status == RunStatus::Running {
                *runs_running.entry(record.agent_id.to_string()).or_default() += 1;
            }
        }
    }

    let live = sessions.list_sessions(paths, &crate::sessions::SessionFilter {
        status: Some(RunStatus::Running),
        ..crate::sessions::SessionFilter::default()
    });
    let mut live_by_agent: BTreeMap<String, usize> = BTreeMap::new();
    for record in &live {
        let run_yaml = paths.run_yaml(&record.project_id, &record.run_id);
        let Ok(text) = std::fs::read_to_string(&run_yaml) else {
            continue;
        };
        let Ok(run) = serde_yaml::from_str::<ac_core::RunRecord>(&text) else {
            continue;
        };
        *live_by_agent.entry(run.agent_id.to_string()).or_default() += 1;
    }

    let agents_dir = paths.root().join("org/agents");
    let Ok(entries) = std::fs::read_dir(&agents_dir) else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for entry in entries.flatten() {
        let Ok(text) = std::fs::read_to_string(entry.path().join("agent.yaml")) else {
            continue;
        };
        let Ok(agent) = serde_yaml::from_str::<AgentYaml>(&text) else {
            continue;
        };
        let id = entry.file_name().to_string_lossy().to_string();
        rows.push(ColleagueRow {
            runs_total: runs_total.get(&id).copied().unwrap_or(0),
            runs_running: runs_running.get(&id).copied().unwrap_or(0),
            live_sessions: live_by_agent.get(&id).copied().unwrap_or(0),
            agent_id: AgentId::new(id),
            role: agent.role,
            team_id: agent.team_id,
        });
    }
    rows.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    rows
}

fn list_projects(paths: &WorkspacePaths) -> Vec<ProjectId> {
    let Ok(entries) = std::fs::read_dir(paths.root().join("work/projects")) else {
        return Vec::new();
    };
    let mut projects: Vec<ProjectId> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| ProjectId::new(e.file_name().to_string_lossy().to_string()))
        .collect();
    projects.sort();
    projects
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
