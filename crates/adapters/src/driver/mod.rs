// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider command builders.
//!
//! Each supported provider gets a driver that knows how to turn a prompt
//! into an argv, which output files it prefers, and how to dig the final
//! message out of the provider's raw output format. Two subscription-CLI
//! drivers (Codex, Claude) and one API driver (Gemini) are covered.

mod claude;
mod codex;
mod gemini;

pub use claude::ClaudeDriver;
pub use codex::CodexDriver;
pub use gemini::GeminiDriver;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("launcher template rejected: {0}")]
    LauncherTemplate(String),
}

/// How the result contract is communicated to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultContractMode {
    /// The prompt alone instructs the worker to print strict JSON.
    PromptOnly,
    /// Additionally pass the provider's native output-schema flag.
    ProviderSchema,
}

/// Inputs for building one launch command.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Resolved provider binary.
    pub bin: String,
    pub prompt: String,
    pub mode: ResultContractMode,
    /// JSON schema text for `ProviderSchema` mode.
    pub schema_json: Option<String>,
    /// Optional worker-record launcher template overriding argv.
    pub launcher_template: Option<String>,
}

/// A fully built command: argv plus any stdin payload and extra env.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub stdin_text: Option<String>,
    pub env: Vec<(String, String)>,
}

impl std::fmt::Debug for dyn WorkerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerDriver")
            .field("provider", &self.provider())
            .finish()
    }
}

/// The per-provider driver seam.
pub trait WorkerDriver: Send + Sync {
    fn provider(&self) -> &'static str;

    fn default_bin(&self) -> &'static str;

    /// The help-page flag whose presence signals native schema support.
    fn schema_flag(&self) -> Option<&'static str>;

    /// Output files to read for the result, in preference order.
    fn preferred_outputs(&self) -> &'static [&'static str] {
        &[
            "result_spec.json",
            "result_spec.jsonl",
            "last_message.md",
            "stdout.txt",
            "stderr.txt",
        ]
    }

    fn build_command(&self, request: &CommandRequest) -> Result<CommandSpec, DriverError>;

    /// Extract the final message text from the provider's raw output.
    fn extract_text(&self, raw: &str) -> String {
        raw.to_string()
    }

    /// Provider-reported token usage dug out of the raw output, when the
    /// wire format carries it.
    fn extract_usage(&self, _raw: &str) -> Option<ac_core::RunUsage> {
        None
    }

    /// Probe result: does the binary's help page report schema support?
    fn supports_output_schema(&self, help_text: &str) -> bool {
        self.schema_flag()
            .map(|flag| help_text.contains(flag))
            .unwrap_or(false)
    }
}

/// Resolve a driver by provider name.
pub fn driver_for(provider: &str) -> Result<&'static dyn WorkerDriver, DriverError> {
    static CODEX: CodexDriver = CodexDriver;
    static CLAUDE: ClaudeDriver = ClaudeDriver;
    static GEMINI: GeminiDriver = GeminiDriver;
    match provider {
        "codex" => Ok(&CODEX),
        "claude" => Ok(&CLAUDE),
        "gemini" => Ok(&GEMINI),
        other => Err(DriverError::UnknownProvider(other.to_string())),
    }
}

/// Expand a worker-record launcher template into argv.
///
/// Guard rails: no newlines, no shell wrappers. `${bin}` and `${prompt}`
/// placeholders substitute whole tokens; `${prompt}` never goes through a
/// shell, so no escaping is needed.
pub(crate) fn apply_launcher_template(
    template: &str,
    bin: &str,
    prompt: &str,
) -> Result<Vec<String>, DriverError> {
    if template.contains('\n') || template.contains('\r') {
        return Err(DriverError::LauncherTemplate(
            "template must not contain newlines".to_string(),
        ));
    }
    let tokens: Vec<String> = template
        .split_whitespace()
        .map(|tok| match tok {
            "${bin}" => bin.to_string(),
            "${prompt}" => prompt.to_string(),
            other => other.to_string(),
        })
        .collect();
    if tokens.is_empty() {
        return Err(DriverError::LauncherTemplate("template is empty".to_string()));
    }

    let first = tokens[0].rsplit('/').next().unwrap_or(&tokens[0]);
    const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "fish", "env"];
    if SHELLS.contains(&first) {
        return Err(DriverError::LauncherTemplate(format!(
            "shell wrapper {first:?} is not allowed"
        )));
    }
    Ok(tokens)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
