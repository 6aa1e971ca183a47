// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::ResultContractMode;

#[test]
fn exec_command_shape() {
    let spec = CodexDriver
        .build_command(&CommandRequest {
            bin: "/usr/local/bin/codex".to_string(),
            prompt: "fix the bug".to_string(),
            mode: ResultContractMode::PromptOnly,
            schema_json: None,
            launcher_template: None,
        })
        .unwrap();
    assert_eq!(
        spec.argv,
        vec!["/usr/local/bin/codex", "exec", "--json", "fix the bug"]
    );
    assert!(spec.stdin_text.is_none());
}

#[test]
fn schema_mode_requires_schema_text() {
    // Without schema text the flag is simply omitted
    let spec = CodexDriver
        .build_command(&CommandRequest {
            bin: "codex".to_string(),
            prompt: "p".to_string(),
            mode: ResultContractMode::ProviderSchema,
            schema_json: None,
            launcher_template: None,
        })
        .unwrap();
    assert!(!spec.argv.contains(&"--output-schema".to_string()));
}
