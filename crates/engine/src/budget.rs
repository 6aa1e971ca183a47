// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Budget ceilings and enforcement.
//!
//! A resource's ceiling comes from the nearest enclosing owner that
//! declares one: task front-matter, then `project.yaml`, then
//! `company.yaml`. Every check emits a `budget.decision`; crossing the
//! soft ceiling adds `budget.alert`, crossing the hard ceiling adds
//! `budget.exceeded` and is fatal (at preflight it refuses the launch).

use ac_core::{EventDraft, ProjectId, RunRecord, TaskId};
use ac_storage::WorkspacePaths;
use serde::{Deserialize, Serialize};

/// Declared ceilings. All optional; an absent metric is unchecked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetCeiling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_token_limit: Option<u64>,
}

impl BudgetCeiling {
    pub fn is_empty(&self) -> bool {
        self.soft_cost_usd.is_none()
            && self.hard_cost_usd.is_none()
            && self.hard_token_limit.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetScope {
    Task,
    Project,
    Workspace,
}

impl BudgetScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetScope::Task => "task",
            BudgetScope::Project => "project",
            BudgetScope::Workspace => "workspace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetResult {
    Ok,
    Alert,
    Exceeded,
}

impl BudgetResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetResult::Ok => "ok",
            BudgetResult::Alert => "alert",
            BudgetResult::Exceeded => "exceeded",
        }
    }

    fn severity(&self) -> &'static str {
        match self {
            BudgetResult::Ok => "info",
            BudgetResult::Alert => "warning",
            BudgetResult::Exceeded => "critical",
        }
    }
}

/// One evaluated metric.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetCheck {
    pub scope: BudgetScope,
    pub metric: &'static str,
    pub result: BudgetResult,
    pub actual: f64,
    pub threshold: f64,
    pub severity: &'static str,
}

/// Evaluate the declared metrics against incurred usage.
pub fn evaluate(
    scope: BudgetScope,
    ceiling: &BudgetCeiling,
    cost_usd: f64,
    tokens: u64,
) -> Vec<BudgetCheck> {
    let mut checks = Vec::new();

    let cost_check = match (ceiling.hard_cost_usd, ceiling.soft_cost_usd) {
        (Some(hard), _) if cost_usd >= hard => Some((BudgetResult::Exceeded, hard)),
        (_, Some(soft)) if cost_usd >= soft => Some((BudgetResult::Alert, soft)),
        (_, Some(soft)) => Some((BudgetResult::Ok, soft)),
        (Some(hard), None) => Some((BudgetResult::Ok, hard)),
        (None, None) => None,
    };
    if let Some((result, threshold)) = cost_check {
        checks.push(BudgetCheck {
            scope,
            metric: "cost_usd",
            result,
            actual: cost_usd,
            threshold,
            severity: result.severity(),
        });
    }

    if let Some(limit) = ceiling.hard_token_limit {
        let result = if tokens >= limit {
            BudgetResult::Exceeded
        } else {
            BudgetResult::Ok
        };
        checks.push(BudgetCheck {
            scope,
            metric: "tokens",
            result,
            actual: tokens as f64,
            threshold: limit as f64,
            severity: result.severity(),
        });
    }

    checks
}

/// Outcome of a budget gate pass.
#[derive(Debug, Clone, Default)]
pub struct BudgetVerdict {
    pub checks: Vec<BudgetCheck>,
    /// First exceeded check, if any; fatal at preflight.
    pub blocked: Option<BudgetCheck>,
}

impl BudgetVerdict {
    pub fn from_checks(checks: Vec<BudgetCheck>) -> Self {
        let blocked = checks
            .iter()
            .find(|c| c.result == BudgetResult::Exceeded)
            .cloned();
        Self { checks, blocked }
    }

    /// Event drafts for this verdict: one `budget.decision` per check plus
    /// alert/exceeded escalations. `phase` is `preflight` or `settlement`.
    pub fn event_drafts(&self, phase: &str) -> Vec<EventDraft> {
        let mut drafts = Vec::new();
        for check in &self.checks {
            drafts.push(EventDraft::budget_decision(
                check.scope.as_str(),
                check.metric,
                check.result.as_str(),
                check.actual,
                check.threshold,
            ));
            match check.result {
                BudgetResult::Alert => drafts.push(EventDraft::budget_alert(
                    check.scope.as_str(),
                    check.metric,
                    check.actual,
                    check.threshold,
                )),
                BudgetResult::Exceeded => drafts.push(EventDraft::budget_exceeded(
                    check.scope.as_str(),
                    check.metric,
                    check.actual,
                    check.threshold,
                    phase,
                )),
                BudgetResult::Ok => {}
            }
        }
        drafts
    }
}

#[derive(Debug, Default, Deserialize)]
struct BudgetHolder {
    #[serde(default)]
    budget: Option<BudgetCeiling>,
}

/// Find the nearest enclosing ceiling: task, then project, then workspace.
pub fn load_ceiling(
    paths: &WorkspacePaths,
    project_id: &ProjectId,
    task_id: Option<&TaskId>,
) -> (BudgetScope, BudgetCeiling) {
    if let Some(task_id) = task_id {
        let task_path = paths
            .project_dir(project_id)
            .join("tasks")
            .join(format!("{task_id}.md"));
        if let Some(ceiling) = front_matter_budget(&task_path) {
            if !ceiling.is_empty() {
                return (BudgetScope::Task, ceiling);
            }
        }
    }

    if let Some(ceiling) = yaml_budget(&paths.project_yaml(project_id)) {
        if !ceiling.is_empty() {
            return (BudgetScope::Project, ceiling);
        }
    }

    if let Some(ceiling) = yaml_budget(&paths.company_yaml()) {
        if !ceiling.is_empty() {
            return (BudgetScope::Workspace, ceiling);
        }
    }

    (BudgetScope::Workspace, BudgetCeiling::default())
}

fn yaml_budget(path: &std::path::Path) -> Option<BudgetCeiling> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_yaml::from_str::<BudgetHolder>(&text).ok()?.budget
}

fn front_matter_budget(path: &std::path::Path) -> Option<BudgetCeiling> {
    let text = std::fs::read_to_string(path).ok()?;
    let rest = text.strip_prefix("---\n")?;
    let (front, _) = rest.split_once("\n---\n")?;
    serde_yaml::from_str::<BudgetHolder>(front).ok()?.budget
}

/// Sum incurred cost and tokens over a project's runs.
pub fn incurred_for_project(paths: &WorkspacePaths, project_id: &ProjectId) -> (f64, u64) {
    let runs_dir = paths.runs_dir(project_id);
    let Ok(entries) = std::fs::read_dir(&runs_dir) else {
        return (0.0, 0);
    };
    let mut cost = 0.0;
    let mut tokens = 0u64;
    for entry in entries.flatten() {
        let run_yaml = entry.path().join("run.yaml");
        let Ok(text) = std::fs::read_to_string(&run_yaml) else {
            continue;
        };
        let Ok(record) = serde_yaml::from_str::<RunRecord>(&text) else {
            continue;
        };
        if let Some(usage) = record.usage {
            cost += usage.cost_usd;
            tokens += usage.total_tokens();
        }
    }
    (cost, tokens)
}

/// The preflight gate: evaluate the project's incurred usage against the
/// nearest ceiling.
pub fn preflight(
    paths: &WorkspacePaths,
    project_id: &ProjectId,
    task_id: Option<&TaskId>,
) -> BudgetVerdict {
    let (scope, ceiling) = load_ceiling(paths, project_id, task_id);
    if ceiling.is_empty() {
        return BudgetVerdict::default();
    }
    let (cost, tokens) = incurred_for_project(paths, project_id);
    BudgetVerdict::from_checks(evaluate(scope, &ceiling, cost, tokens))
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
