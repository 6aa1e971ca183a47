// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RBAC policy gate.
//!
//! A single `enforce_policy(actor, action, resource)` evaluator. Rules are
//! ordered deterministically and the first matching rule wins; anything no
//! rule claims is allowed by the trailing default.

use ac_core::{Actor, Role, Sensitivity, TeamId, Visibility};
use serde::Serialize;

/// What the actor is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Read an event or artifact surface.
    Read,
    /// Pull a memory artifact into a context pack.
    ComposeMemory,
    /// Launch a worker run.
    LaunchWorker,
    /// Approve a memory delta.
    ApproveMemoryDelta,
    /// Approve a heartbeat action proposal.
    ApproveHeartbeatAction,
}

/// Everything a rule may need to know about the resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceCtx {
    pub visibility: Option<Visibility>,
    pub sensitivity: Option<Sensitivity>,
    /// Producer of the artifact/event under consideration.
    pub producer_id: Option<String>,
    pub producer_team: Option<TeamId>,
    /// For launches: the worker's own team and the run's target team.
    pub worker_team: Option<TeamId>,
    pub target_team: Option<TeamId>,
}

/// The evaluator's verdict, ready to be written as a `policy.decision`
/// (or `policy.denied`) event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub rule_id: String,
    pub reason: String,
}

impl PolicyDecision {
    fn allow(rule_id: &str) -> Self {
        Self {
            allowed: true,
            rule_id: rule_id.to_string(),
            reason: String::new(),
        }
    }

    fn deny(rule_id: &str, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            rule_id: rule_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Evaluate the ordered rule set; first match wins.
pub fn enforce_policy(actor: &Actor, action: PolicyAction, resource: &ResourceCtx) -> PolicyDecision {
    // 1. Restricted memory is readable only by the producer, their team's
    //    manager+, or the global CEO / trusted human.
    if matches!(action, PolicyAction::Read | PolicyAction::ComposeMemory)
        && resource.sensitivity == Some(Sensitivity::Restricted)
    {
        let rule_id = "compose.sensitivity.restricted";
        let is_producer = resource.producer_id.as_deref() == Some(actor.id.as_str());
        let is_team_manager = actor.role.is_manager_or_above()
            && resource.producer_team.is_some()
            && actor.team_id == resource.producer_team;
        let is_global = matches!(actor.role, Role::Ceo | Role::Human);
        return if is_producer || is_team_manager || is_global {
            PolicyDecision::allow(rule_id)
        } else {
            PolicyDecision::deny(rule_id, "restricted memory is limited to its producer chain")
        };
    }

    // 2. Visibility rules for plain reads.
    if action == PolicyAction::Read {
        if let Some(visibility) = resource.visibility {
            return match visibility {
                Visibility::PrivateAgent => {
                    let rule_id = "read.visibility.private_agent";
                    if resource.producer_id.as_deref() == Some(actor.id.as_str()) {
                        PolicyDecision::allow(rule_id)
                    } else {
                        PolicyDecision::deny(rule_id, "private to its producer")
                    }
                }
                Visibility::Team => {
                    let rule_id = "read.visibility.team";
                    let same_team =
                        resource.producer_team.is_some() && actor.team_id == resource.producer_team;
                    let is_producer = resource.producer_id.as_deref() == Some(actor.id.as_str());
                    if same_team || is_producer || matches!(actor.role, Role::Human | Role::Ceo) {
                        PolicyDecision::allow(rule_id)
                    } else {
                        PolicyDecision::deny(rule_id, "visible to the producer's team only")
                    }
                }
                Visibility::Managers => {
                    let rule_id = "read.visibility.managers";
                    if actor.role.is_manager_or_above() {
                        PolicyDecision::allow(rule_id)
                    } else {
                        PolicyDecision::deny(rule_id, "requires manager or above")
                    }
                }
                Visibility::Org => PolicyDecision::allow("read.visibility.org"),
            };
        }
    }

    // 3. Cross-team worker launches are denied.
    if action == PolicyAction::LaunchWorker {
        let rule_id = "launch.team.cross_team_worker";
        if let (Some(worker_team), Some(target_team)) =
            (&resource.worker_team, &resource.target_team)
        {
            if worker_team != target_team {
                return PolicyDecision::deny(
                    rule_id,
                    format!("worker team {worker_team} differs from target team {target_team}"),
                );
            }
        }
        return PolicyDecision::allow(rule_id);
    }

    // 4. Approvals require manager+.
    if matches!(
        action,
        PolicyAction::ApproveMemoryDelta | PolicyAction::ApproveHeartbeatAction
    ) {
        let rule_id = match action {
            PolicyAction::ApproveMemoryDelta => "approve.memory_delta",
            _ => "approve.heartbeat_action",
        };
        return if actor.role.is_manager_or_above() {
            PolicyDecision::allow(rule_id)
        } else {
            PolicyDecision::deny(rule_id, "approval requires manager or above")
        };
    }

    PolicyDecision::allow("default.allow")
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
