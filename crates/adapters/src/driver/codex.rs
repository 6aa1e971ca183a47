// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex subscription-CLI driver.

use super::{apply_launcher_template, CommandRequest, CommandSpec, DriverError, WorkerDriver};

pub struct CodexDriver;

impl WorkerDriver for CodexDriver {
    fn provider(&self) -> &'static str {
        "codex"
    }

    fn default_bin(&self) -> &'static str {
        "codex"
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
            "exec".to_string(),
            "--json".to_string(),
        ];
        if request.mode == super::ResultContractMode::ProviderSchema {
            if let Some(schema) = &request.schema_json {
                argv.push("--output-schema".to_string());
                argv.push(schema.clone());
            }
        }
        argv.push(request.prompt.clone());
        Ok(CommandSpec {
            argv,
            stdin_text: None,
            env: Vec::new(),
        })
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
