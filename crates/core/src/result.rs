// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker result contract.
//!
//! Every worker attempt must normalize to a `ResultSpec`. Normalization
//! itself lives in the engine; this module owns the schema, the
//! "looks like a result" probe used to pick a candidate among extracted
//! JSON objects, and the typed fallback emitted when repair fails.

use crate::id::{JobId, RunId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RESULT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Succeeded,
    NeedsInput,
    Blocked,
    Failed,
    Canceled,
}

/// A structured error reported by (or on behalf of) a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The normalized result of one worker attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSpec {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_run_id: Option<RunId>,
    pub status: ResultStatus,
    pub summary: String,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub commands_run: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub errors: Vec<ResultError>,
}

fn default_schema_version() -> u32 {
    RESULT_SCHEMA_VERSION
}

fn default_type() -> String {
    "result".to_string()
}

impl ResultSpec {
    /// Quick probe: does this JSON object plausibly carry a result?
    ///
    /// Presence of a status+summary pair, or of the job/attempt ids, is
    /// enough to nominate a candidate for full validation.
    pub fn looks_like_result(value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        (obj.contains_key("status") && obj.contains_key("summary"))
            || (obj.contains_key("job_id") && obj.contains_key("attempt_run_id"))
    }

    /// Validate a candidate against the full contract.
    ///
    /// Missing `job_id`/`attempt_run_id` are forced to the expected values;
    /// mismatched ids are an error. Returns the spec or the list of issues.
    pub fn from_candidate(
        value: Value,
        expected_job: &JobId,
        expected_run: &RunId,
    ) -> Result<ResultSpec, Vec<String>> {
        let mut spec: ResultSpec = match serde_json::from_value(value) {
            Ok(spec) => spec,
            Err(e) => return Err(vec![format!("schema: {e}")]),
        };

        let mut issues = Vec::new();
        if spec.kind != "result" {
            issues.push(format!("type must be \"result\", got {:?}", spec.kind));
        }
        match &spec.job_id {
            None => spec.job_id = Some(expected_job.clone()),
            Some(id) if id != expected_job => {
                issues.push(format!(
                    "job_id mismatch: expected {expected_job}, got {id}"
                ));
            }
            Some(_) => {}
        }
        match &spec.attempt_run_id {
            None => spec.attempt_run_id = Some(expected_run.clone()),
            Some(id) if id != expected_run => {
                issues.push(format!(
                    "attempt_run_id mismatch: expected {expected_run}, got {id}"
                ));
            }
            Some(_) => {}
        }
        if spec.summary.trim().is_empty() {
            issues.push("summary must not be empty".to_string());
        }

        if issues.is_empty() {
            spec.schema_version = RESULT_SCHEMA_VERSION;
            Ok(spec)
        } else {
            Err(issues)
        }
    }

    /// The typed fallback for output that could not be normalized.
    pub fn unparseable_fallback(job_id: JobId, run_id: RunId, detail: &str) -> ResultSpec {
        ResultSpec {
            schema_version: RESULT_SCHEMA_VERSION,
            kind: "result".to_string(),
            job_id: Some(job_id),
            attempt_run_id: Some(run_id),
            status: ResultStatus::NeedsInput,
            summary: format!(
                "Worker output could not be normalized to the result contract: {detail}"
            ),
            files_changed: vec![],
            commands_run: vec![],
            artifacts: vec![],
            next_actions: vec![],
            errors: vec![ResultError {
                code: "result_unparseable".to_string(),
                message: Some(detail.to_string()),
            }],
        }
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
