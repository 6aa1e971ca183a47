// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable knobs recognized by the engine.

use std::time::Duration;

/// Default per-attempt worker timeout (30 minutes).
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn parse_limit(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .map(|v| v.max(1))
        .unwrap_or(default)
}

/// `AC_LAUNCH_WORKSPACE_LIMIT`, lower bound 1.
pub fn workspace_limit() -> usize {
    parse_limit("AC_LAUNCH_WORKSPACE_LIMIT", 4)
}

/// `AC_LAUNCH_PROVIDER_LIMIT`, lower bound 1.
pub fn provider_limit() -> usize {
    parse_limit("AC_LAUNCH_PROVIDER_LIMIT", 2)
}

/// `AC_LAUNCH_TEAM_LIMIT`, lower bound 1.
pub fn team_limit() -> usize {
    parse_limit("AC_LAUNCH_TEAM_LIMIT", 2)
}

/// `AC_JOB_ATTEMPT_TIMEOUT_MS` override for the per-attempt timeout.
pub fn attempt_timeout() -> Duration {
    std::env::var("AC_JOB_ATTEMPT_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
