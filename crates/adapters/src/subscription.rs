// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription guard: prove the configured provider channel is usable
//! before any launch.
//!
//! Subscription-CLI providers must not silently fall back to API-key
//! billing: if a bypassing key is set, the launch is refused. API-channel
//! providers must have their credentials present. Either way the guard
//! resolves the binary against an allow-list first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::env::EnvSnapshot;
use crate::subprocess::{run_with_timeout, AUTH_PROBE_TIMEOUT};

/// How a provider bills the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    SubscriptionCli,
    Api,
}

/// How subscription proof is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofStrategy {
    /// No probe; only the bypass-env check applies.
    EnvAbsence,
    /// Run a subcommand and require exit 0 plus an indicator on stdout.
    ProbeSubcommand {
        argv: Vec<&'static str>,
        indicator: &'static str,
    },
}

impl ProofStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ProofStrategy::EnvAbsence => "env_absence",
            ProofStrategy::ProbeSubcommand { .. } => "probe_subcommand",
        }
    }
}

/// Per-provider subscription policy.
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    pub provider: &'static str,
    pub channel: Channel,
    pub require_subscription_proof: bool,
    pub proof_strategy: ProofStrategy,
    /// Basename patterns the resolved binary must match. A trailing `*`
    /// matches any suffix.
    pub allowed_bin_patterns: Vec<&'static str>,
    /// Env vars that would silently bypass the subscription channel.
    pub bypass_env_keys: Vec<&'static str>,
    /// Env vars (any-of groups) required for the API channel.
    pub required_env_any_of: Vec<Vec<&'static str>>,
}

/// Built-in policies for the covered providers.
pub fn default_policy_for(provider: &str) -> Option<ProviderPolicy> {
    match provider {
        "codex" => Some(ProviderPolicy {
            provider: "codex",
            channel: Channel::SubscriptionCli,
            require_subscription_proof: true,
            proof_strategy: ProofStrategy::ProbeSubcommand {
                argv: vec!["login", "status"],
                indicator: "Logged in",
            },
            allowed_bin_patterns: vec!["codex", "codex-*"],
            bypass_env_keys: vec!["OPENAI_API_KEY", "CODEX_API_KEY"],
            required_env_any_of: vec![],
        }),
        "claude" => Some(ProviderPolicy {
            provider: "claude",
            channel: Channel::SubscriptionCli,
            require_subscription_proof: true,
            proof_strategy: ProofStrategy::EnvAbsence,
            allowed_bin_patterns: vec!["claude", "claude-*"],
            bypass_env_keys: vec!["ANTHROPIC_API_KEY"],
            required_env_any_of: vec![],
        }),
        "gemini" => Some(ProviderPolicy {
            provider: "gemini",
            channel: Channel::Api,
            require_subscription_proof: false,
            proof_strategy: ProofStrategy::EnvAbsence,
            allowed_bin_patterns: vec!["gemini", "gemini-*"],
            bypass_env_keys: vec![],
            required_env_any_of: vec![
                vec!["GEMINI_API_KEY"],
                vec!["GOOGLE_API_KEY"],
                vec![
                    "GOOGLE_GENAI_USE_VERTEXAI",
                    "GOOGLE_CLOUD_PROJECT",
                    "GOOGLE_CLOUD_LOCATION",
                ],
            ],
        }),
        _ => None,
    }
}

/// Outcome of one subscription check, ready to be written as a
/// `worker.subscription_check.*` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCheck {
    pub passed: bool,
    pub bin: String,
    pub strategy: String,
    /// Stable failure code; empty when passed.
    pub reason: String,
}

impl SubscriptionCheck {
    fn pass(bin: &str, strategy: &str) -> Self {
        Self {
            passed: true,
            bin: bin.to_string(),
            strategy: strategy.to_string(),
            reason: String::new(),
        }
    }

    fn fail(bin: &str, strategy: &str, reason: &str) -> Self {
        Self {
            passed: false,
            bin: bin.to_string(),
            strategy: strategy.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Seam for running auth probe subcommands.
#[async_trait]
pub trait AuthProbe: Send + Sync {
    /// Returns (exit_code, stdout) or a spawn error.
    async fn run(&self, bin: &str, argv: &[&str]) -> Result<(i32, String), String>;
}

/// Real probe: spawns the binary.
pub struct CliAuthProbe;

#[async_trait]
impl AuthProbe for CliAuthProbe {
    async fn run(&self, bin: &str, argv: &[&str]) -> Result<(i32, String), String> {
        let mut cmd = tokio::process::Command::new(bin);
        cmd.args(argv);
        let output = run_with_timeout(cmd, AUTH_PROBE_TIMEOUT, "auth probe").await?;
        Ok((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
        ))
    }
}

/// Scripted probe for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeAuthProbe {
    pub result: Result<(i32, String), String>,
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AuthProbe for FakeAuthProbe {
    async fn run(&self, _bin: &str, _argv: &[&str]) -> Result<(i32, String), String> {
        self.result.clone()
    }
}

/// Run the full guard for one provider binary.
pub async fn verify(
    policy: &ProviderPolicy,
    bin_path: &str,
    env: &EnvSnapshot,
    probe: &dyn AuthProbe,
) -> SubscriptionCheck {
    let strategy = policy.proof_strategy.name();

    // 1. Binary allow-list
    let basename = bin_path.rsplit('/').next().unwrap_or(bin_path);
    let allowed = policy
        .allowed_bin_patterns
        .iter()
        .any(|pattern| matches_pattern(pattern, basename));
    if !allowed {
        return SubscriptionCheck::fail(bin_path, strategy, "unapproved_worker_binary");
    }

    match policy.channel {
        // 2. API channel: credentials must be present
        Channel::Api => {
            let satisfied = policy
                .required_env_any_of
                .iter()
                .any(|group| group.iter().all(|key| env.is_set(key)));
            if satisfied {
                SubscriptionCheck::pass(bin_path, strategy)
            } else {
                SubscriptionCheck::fail(bin_path, strategy, "auth_probe_failed")
            }
        }
        // 3. Subscription CLI: refuse bypassing keys, then maybe probe
        Channel::SubscriptionCli => {
            if let Some(key) = env.first_set(&policy.bypass_env_keys) {
                tracing::warn!(provider = policy.provider, key, "api key would bypass subscription");
                return SubscriptionCheck::fail(bin_path, strategy, "api_key_present");
            }
            if !policy.require_subscription_proof {
                return SubscriptionCheck::pass(bin_path, strategy);
            }
            match &policy.proof_strategy {
                ProofStrategy::EnvAbsence => SubscriptionCheck::pass(bin_path, strategy),
                ProofStrategy::ProbeSubcommand { argv, indicator } => {
                    match probe.run(bin_path, argv).await {
                        Ok((0, stdout)) if stdout.contains(indicator) => {
                            SubscriptionCheck::pass(bin_path, strategy)
                        }
                        Ok(_) | Err(_) => {
                            SubscriptionCheck::fail(bin_path, strategy, "auth_probe_failed")
                        }
                    }
                }
            }
        }
    }
}

/// `pattern` matches `name` exactly, or by prefix when it ends in `*`.
fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
