// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini API-channel driver.
//!
//! Unlike the subscription CLIs, Gemini runs against an API key (or a
//! Vertex AI project). The prompt goes over stdin so arbitrarily long
//! goals never hit argv limits.

use super::{apply_launcher_template, CommandRequest, CommandSpec, DriverError, WorkerDriver};

pub struct GeminiDriver;

impl WorkerDriver for GeminiDriver {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn default_bin(&self) -> &'static str {
        "gemini"
    }

    fn schema_flag(&self) -> Option<&'static str> {
        None
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

        Ok(CommandSpec {
            argv: vec![request.bin.clone()],
            stdin_text: Some(request.prompt.clone()),
            env: Vec::new(),
        })
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
