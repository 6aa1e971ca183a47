// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude subscription-CLI driver.
//!
//! Runs `claude -p` in stream-JSON mode. The raw output is one JSON object
//! per line; the final assistant markdown is either the `result` field of
//! the terminal `type:"result"` record or, failing that, the last
//! `type:"assistant"` text block.

use super::{apply_launcher_template, CommandRequest, CommandSpec, DriverError, WorkerDriver};
use serde_json::Value;

pub struct ClaudeDriver;

impl WorkerDriver for ClaudeDriver {
    fn provider(&self) -> &'static str {
        "claude"
    }

    fn default_bin(&self) -> &'static str {
        "claude"
    }

    fn schema_flag(&self) -> Option<&'static str> {
        Some("--output-schema")
    }

    fn build_command(&self, request: &CommandRequest) -> Result<CommandSpec, DriverError> {
        if let Some(template) = &request.launcher_template {
            let argv = apply_launcher_template(template, &request.bin, &request.prompt)?;
            return Ok(CommandSpec {
                argv,
                stdin_text: None,
                env: Vec::new(),
            });
        }

        let mut argv = vec![
            request.bin.clone(),
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        if request.mode == super::ResultContractMode::ProviderSchema {
            if let Some(schema) = &request.schema_json {
                argv.push("--output-schema".to_string());
                argv.push(schema.clone());
            }
        }
        Ok(CommandSpec {
            argv,
            stdin_text: None,
            env: Vec::new(),
        })
    }

    fn extract_text(&self, raw: &str) -> String {
        let mut last_assistant: Option<String> = None;
        let mut final_result: Option<String> = None;

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
                continue;
            };
            match value.get("type").and_then(Value::as_str) {
                Some("result") => {
                    if let Some(text) = value.get("result").and_then(Value::as_str) {
                        final_result = Some(text.to_string());
                    }
                }
                Some("assistant") => {
                    if let Some(text) = assistant_text(&value) {
                        last_assistant = Some(text);
                    }
                }
                _ => {}
            }
        }

        final_result
            .or(last_assistant)
            .unwrap_or_else(|| raw.to_string())
    }

    /// The terminal `type:"result"` record carries cumulative usage.
    fn extract_usage(&self, raw: &str) -> Option<ac_core::RunUsage> {
        for line in raw.lines().rev() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
                continue;
            };
            if value.get("type").and_then(Value::as_str) != Some("result") {
                continue;
            }
            let usage = value.get("usage")?;
            let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
            return Some(ac_core::RunUsage {
                source: ac_core::UsageSource::ProviderReported,
                confidence: ac_core::UsageConfidence::High,
                input_tokens: count("input_tokens"),
                cached_input_tokens: count("cache_read_input_tokens"),
                output_tokens: count("output_tokens"),
                reasoning_output_tokens: 0,
                cost_usd: 0.0,
                cost_source: "provider".to_string(),
            });
        }
        None
    }
}

/// Concatenated text blocks of one assistant message.
fn assistant_text(value: &Value) -> Option<String> {
    let content = value.get("message")?.get("content")?.as_array()?;
    let parts: Vec<&str> = content
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
