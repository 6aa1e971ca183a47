// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event envelopes and canonical JSON.
//!
//! Every line of an `events.jsonl` file is one envelope. Envelopes form a
//! hash chain: `event_hash = sha256(canonical(envelope without event_hash))`
//! and `prev_event_hash` is the previous line's hash (null at the head).
//! Canonical JSON means lexicographically sorted object keys with no extra
//! whitespace; the hash itself is computed by the event log, not here.

use crate::id::{RunId, SessionRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENVELOPE_SCHEMA_VERSION: u32 = 1;

/// Who may read an event (or artifact) inside the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    PrivateAgent,
    Team,
    Managers,
    Org,
}

/// A fully-formed event record as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub schema_version: u32,
    pub event_id: String,
    /// Defaults to the session ref when the emitter has nothing better.
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    /// ISO 8601 wallclock stamp.
    pub ts_wallclock: String,
    pub ts_monotonic_ms: u64,
    pub run_id: RunId,
    pub session_ref: SessionRef,
    pub actor: String,
    pub visibility: Visibility,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    pub prev_event_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_hash: Option<String>,
}

impl EventEnvelope {
    /// The envelope with `event_hash` removed, for hashing.
    pub fn without_hash(&self) -> EventEnvelope {
        EventEnvelope {
            event_hash: None,
            ..self.clone()
        }
    }
}

/// Serialize a value as canonical JSON: object keys sorted, no whitespace.
///
/// `serde_json`'s default map is ordered by key, so routing a value through
/// `to_value` normalizes struct field order into sorted-key object order.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let normalized = serde_json::to_value(value)?;
    serde_json::to_string(&normalized)
}

/// An event not yet stamped, hashed, or chained.
///
/// Drafts carry only what the emitter knows; the event log fills in the
/// envelope ids, timestamps, and chain fields at append time.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub event_type: String,
    pub payload: Value,
    pub actor: String,
    pub visibility: Visibility,
    pub causation_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl EventDraft {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            actor: "system".to_string(),
            visibility: Visibility::Org,
            causation_id: None,
            correlation_id: None,
        }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn caused_by(mut self, event_id: impl Into<String>) -> Self {
        self.causation_id = Some(event_id.into());
        self
    }

    // -- typed constructors for the kinds the kernel emits --

    pub fn run_started(provider: &str, agent_id: &str) -> Self {
        Self::new(
            "run.started",
            serde_json::json!({ "provider": provider, "agent_id": agent_id }),
        )
    }

    pub fn run_ended(exit_code: i32) -> Self {
        Self::new("run.ended", serde_json::json!({ "exit_code": exit_code }))
    }

    pub fn run_stopped(reason: &str) -> Self {
        Self::new("run.stopped", serde_json::json!({ "reason": reason }))
    }

    pub fn run_failed(reason: &str, preflight: bool) -> Self {
        Self::new(
            "run.failed",
            serde_json::json!({ "reason": reason, "preflight": preflight }),
        )
    }

    pub fn policy_decision(rule_id: &str, allowed: bool, reason: &str) -> Self {
        Self::new(
            "policy.decision",
            serde_json::json!({ "rule_id": rule_id, "allowed": allowed, "reason": reason }),
        )
    }

    pub fn policy_denied(rule_id: &str, reason: &str) -> Self {
        Self::new(
            "policy.denied",
            serde_json::json!({ "rule_id": rule_id, "reason": reason }),
        )
    }

    pub fn budget_decision(
        scope: &str,
        metric: &str,
        result: &str,
        actual: f64,
        threshold: f64,
    ) -> Self {
        Self::new(
            "budget.decision",
            serde_json::json!({
                "scope": scope,
                "metric": metric,
                "result": result,
                "actual": actual,
                "threshold": threshold,
            }),
        )
    }

    pub fn budget_alert(scope: &str, metric: &str, actual: f64, threshold: f64) -> Self {
        Self::new(
            "budget.alert",
            serde_json::json!({
                "scope": scope,
                "metric": metric,
                "actual": actual,
                "threshold": threshold,
            }),
        )
    }

    pub fn budget_exceeded(scope: &str, metric: &str, actual: f64, threshold: f64, phase: &str) -> Self {
        Self::new(
            "budget.exceeded",
            serde_json::json!({
                "scope": scope,
                "metric": metric,
                "actual": actual,
                "threshold": threshold,
                "phase": phase,
            }),
        )
    }

    pub fn subscription_check(passed: bool, bin: &str, strategy: &str, reason: &str) -> Self {
        let event_type = if passed {
            "worker.subscription_check.passed"
        } else {
            "worker.subscription_check.failed"
        };
        Self::new(
            event_type,
            serde_json::json!({ "bin": bin, "proof_strategy": strategy, "reason": reason }),
        )
    }

    pub fn cli_provenance(bin: &str, version: &str, help_sha256: &str) -> Self {
        Self::new(
            "worker.cli.provenance",
            serde_json::json!({ "bin": bin, "version": version, "help_sha256": help_sha256 }),
        )
    }

    pub fn heartbeat_tick(
        candidates: usize,
        woken: usize,
        ok_reports: usize,
        skipped_reason: Option<&str>,
    ) -> Self {
        Self::new(
            "heartbeat.tick",
            serde_json::json!({
                "candidates": candidates,
                "woken": woken,
                "ok_reports": ok_reports,
                "skipped_reason": skipped_reason,
            }),
        )
    }

    /// `outcome` picks the event type: `heartbeat.action.executed`,
    /// `.queued`, `.deduped`, or `.skipped`.
    pub fn heartbeat_action(
        outcome: &str,
        idempotency_key: &str,
        kind: &str,
        worker: &str,
        detail: Option<&str>,
    ) -> Self {
        Self::new(
            format!("heartbeat.action.{outcome}"),
            serde_json::json!({
                "idempotency_key": idempotency_key,
                "kind": kind,
                "worker": worker,
                "detail": detail,
            }),
        )
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
