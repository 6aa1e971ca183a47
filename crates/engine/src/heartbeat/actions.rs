// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action rules for worker heartbeat reports.
//!
//! Each proposed action is deduplicated against the durable idempotency
//! table, then either queued for approval (as a
//! `heartbeat_action_proposal` artifact) or auto-executed under policy
//! and rate limits. All state mutation happens on the tick's working
//! copy of [`HeartbeatState`]; persistence is the tick's job.

use ac_core::{
    render_artifact, ActionKind, ActionRisk, Actor, AgentId, ArtifactHeader, ArtifactId,
    ArtifactKind, HeartbeatConfig, HeartbeatState, HierarchyMode, IdempotencyEntry,
    IdempotencyOutcome, ProjectId, Role, Sensitivity, UuidIdGen, Visibility, WorkerAction,
};
use crate::policy::{enforce_policy, PolicyAction, ResourceCtx};

/// What happened to one proposed action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Executed,
    QueuedForApproval { artifact_id: ArtifactId },
    Deduped,
    Skipped { reason: String },
}

/// Immutable context for one tick's rule evaluation.
pub struct ActionCtx<'a> {
    pub config: &'a HeartbeatConfig,
    pub now_iso: String,
    /// UTC `YYYY-MM-DD-HH` bucket for hourly counters.
    pub hour_bucket: String,
    /// Hour-of-day for the quiet-hours window.
    pub hour_of_day: u8,
    pub source_worker: AgentId,
    pub source_role: Role,
    pub default_project: Option<ProjectId>,
    pub run_id: Option<ac_core::RunId>,
}

/// What `apply_rules` decided; the caller performs the side effects for
/// `Execute` (launching jobs, writing comments) and reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Deduped,
    Queue { reason: &'static str },
    Skip { reason: String },
    Execute { actor: Actor },
}

/// Evaluate the rule chain for one action against the tick's working
/// state. Mutates counters/idempotency according to the decision.
pub fn decide(
    state: &mut HeartbeatState,
    ctx: &ActionCtx<'_>,
    action: &WorkerAction,
    actions_executed_this_tick: u32,
) -> Decision {
    // 1. Dedup on the idempotency key (expired entries were pruned)
    if state.idempotency.contains_key(&action.idempotency_key) {
        state.stats.actions_deduped += 1;
        return Decision::Deduped;
    }

    // 2. Anything below must be queued for human approval
    let quiet = ctx
        .config
        .quiet_hours
        .map(|window| window.contains(ctx.hour_of_day))
        .unwrap_or(false);
    let hourly_count = state
        .hourly_action_counters
        .get(&ctx.hour_bucket)
        .copied()
        .unwrap_or(0);

    let queue_reason = if action.kind == ActionKind::CreateApprovalItem {
        Some("approval_item")
    } else if action.needs_approval {
        Some("needs_approval")
    } else if action.risk != ActionRisk::Low {
        Some("risk")
    } else if quiet && action.kind == ActionKind::AddComment {
        Some("quiet_hours")
    } else if actions_executed_this_tick >= ctx.config.max_auto_actions_per_tick {
        Some("per_tick_limit")
    } else if hourly_count >= ctx.config.max_auto_actions_per_hour {
        Some("per_hour_limit")
    } else {
        None
    };

    if let Some(reason) = queue_reason {
        return Decision::Queue { reason };
    }

    // 3. Auto-execute under policy
    let actor = acting_actor(ctx.config, &ctx.source_worker, ctx.source_role);
    let policy_action = match action.kind {
        ActionKind::LaunchJob => PolicyAction::LaunchWorker,
        _ => PolicyAction::ApproveHeartbeatAction,
    };
    let decision = enforce_policy(&actor, policy_action, &ResourceCtx::default());
    if !decision.allowed {
        return Decision::Skip {
            reason: format!("policy_denied:{}", decision.rule_id),
        };
    }
    Decision::Execute { actor }
}

/// Record a queued action: proposal artifact + idempotency entry.
/// Returns the artifact path and rendered content for the caller to write.
pub fn queue_for_approval(
    state: &mut HeartbeatState,
    ctx: &ActionCtx<'_>,
    action: &WorkerAction,
    id_gen: &UuidIdGen,
) -> Result<(ArtifactId, ProjectId, String), ActionOutcome> {
    let Some(project_id) = action
        .project_id
        .clone()
        .or_else(|| ctx.default_project.clone())
    else {
        return Err(ActionOutcome::Skipped {
            reason: "missing_project_for_approval".to_string(),
        });
    };

    let artifact_id = ArtifactId::fresh(id_gen);
    let header = ArtifactHeader {
        id: artifact_id.clone(),
        kind: ArtifactKind::HeartbeatActionProposal,
        title: action
            .summary
            .clone()
            .unwrap_or_else(|| format!("Proposed {:?} action", action.kind)),
        visibility: Visibility::Managers,
        produced_by: ctx.source_worker.clone(),
        run_id: ctx.run_id.clone(),
        context_pack_id: None,
        sensitivity: Sensitivity::Normal,
        created_at: Some(ctx.now_iso.clone()),
        target_file: None,
        review: vec![],
    };
    let body = proposal_body(action);
    let content = match render_artifact(&header, &body) {
        Ok(content) => content,
        Err(e) => {
            return Err(ActionOutcome::Skipped {
                reason: format!("render_failed:{e}"),
            })
        }
    };

    record_idempotency(state, ctx, action, IdempotencyOutcome::Queued);
    state.stats.actions_queued += 1;
    Ok((artifact_id, project_id, content))
}

/// Record a successful auto-execution.
pub fn record_executed(state: &mut HeartbeatState, ctx: &ActionCtx<'_>, action: &WorkerAction) {
    record_idempotency(state, ctx, action, IdempotencyOutcome::Executed);
    *state
        .hourly_action_counters
        .entry(ctx.hour_bucket.clone())
        .or_default() += 1;
    state.stats.actions_executed += 1;
}

fn record_idempotency(
    state: &mut HeartbeatState,
    ctx: &ActionCtx<'_>,
    action: &WorkerAction,
    outcome: IdempotencyOutcome,
) {
    let expires_at = expiry_iso(&ctx.now_iso, ctx.config.idempotency_ttl_days);
    state.idempotency.insert(
        action.idempotency_key.clone(),
        IdempotencyEntry { outcome, expires_at },
    );
}

/// `now + ttl_days`, ISO 8601.
fn expiry_iso(now_iso: &str, ttl_days: u32) -> String {
    use chrono::{DateTime, Utc};
    now_iso
        .parse::<DateTime<Utc>>()
        .ok()
        .and_then(|t| t.checked_add_days(chrono::Days::new(u64::from(ttl_days))))
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| now_iso.to_string())
}

/// Who acts for auto-executed actions under the configured hierarchy.
fn acting_actor(config: &HeartbeatConfig, source: &AgentId, source_role: Role) -> Actor {
    match config.hierarchy_mode {
        HierarchyMode::EnterpriseV1 => {
            if config.allow_director_to_spawn_workers && source_role == Role::Director {
                return Actor::new(source.as_str(), Role::Director);
            }
            match &config.executive_manager_agent_id {
                Some(executive) => Actor::new(executive.as_str(), Role::Manager),
                None => Actor::new("system", Role::Manager),
            }
        }
        HierarchyMode::Flat => Actor::new("system", Role::Manager),
    }
}

fn proposal_body(action: &WorkerAction) -> String {
    let mut body = String::from("## Summary\n\n");
    body.push_str(
        action
            .summary
            .as_deref()
            .unwrap_or("A worker proposed an action during heartbeat triage."),
    );
    body.push_str("\n\n## Proposed Action\n\n```json\n");
    body.push_str(&serde_json::to_string_pretty(action).unwrap_or_default());
    body.push_str("\n```\n");
    body
}

/// UTC hour bucket `YYYY-MM-DD-HH` for an ISO timestamp.
pub fn hour_bucket(now_iso: &str) -> String {
    now_iso
        .get(..13)
        .map(|prefix| prefix.replace('T', "-"))
        .unwrap_or_else(|| "unknown".to_string())
}

/// The hour buckets worth keeping: the last 48 plus the current one.
pub fn recent_hour_buckets(now_iso: &str) -> Vec<String> {
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    let Ok(now) = now_iso.parse::<DateTime<Utc>>() else {
        return vec![hour_bucket(now_iso)];
    };
    (0..=48)
        .map(|h| {
            let t = now - ChronoDuration::hours(h);
            t.format("%Y-%m-%d-%H").to_string()
        })
        .collect()
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
