// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actors and roles inside the simulated organization.

use crate::id::TeamId;
use serde::{Deserialize, Serialize};

/// Organizational role of an actor. Governs what the policy gate permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Ceo,
    Director,
    Manager,
    Worker,
    /// The trusted local human operating the control plane.
    Human,
}

impl Role {
    /// Manager, director, ceo, and the human count as manager-or-above.
    pub fn is_manager_or_above(&self) -> bool {
        matches!(self, Role::Manager | Role::Director | Role::Ceo | Role::Human)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Ceo => "ceo",
            Role::Director => "director",
            Role::Manager => "manager",
            Role::Worker => "worker",
            Role::Human => "human",
        };
        write!(f, "{s}")
    }
}

/// A declared actor: who is performing an operation.
///
/// The control plane assumes a single trusted local user; actors are
/// declared, not authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            team_id: None,
        }
    }

    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
