// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::ResultContractMode;

fn request(mode: ResultContractMode) -> CommandRequest {
    CommandRequest {
        bin: "claude".to_string(),
        prompt: "summarize the repo".to_string(),
        mode,
        schema_json: Some("{\"type\":\"object\"}".to_string()),
        launcher_template: None,
    }
}

#[test]
fn prompt_only_command_uses_stream_json() {
    let spec = ClaudeDriver
        .build_command(&request(ResultContractMode::PromptOnly))
        .unwrap();
    assert_eq!(spec.argv[0], "claude");
    assert!(spec.argv.contains(&"-p".to_string()));
    assert!(spec.argv.contains(&"stream-json".to_string()));
    assert!(!spec.argv.contains(&"--output-schema".to_string()));
}

#[test]
fn provider_schema_mode_appends_schema_flag() {
    let spec = ClaudeDriver
        .build_command(&request(ResultContractMode::ProviderSchema))
        .unwrap();
    let pos = spec
        .argv
        .iter()
        .position(|a| a == "--output-schema")
        .unwrap();
    assert_eq!(spec.argv[pos + 1], "{\"type\":\"object\"}");
}

#[test]
fn launcher_template_overrides_argv() {
    let mut req = request(ResultContractMode::PromptOnly);
    req.launcher_template = Some("${bin} --special ${prompt}".to_string());
    let spec = ClaudeDriver.build_command(&req).unwrap();
    assert_eq!(
        spec.argv,
        vec!["claude", "--special", "summarize the repo"]
    );
}

#[test]
fn extract_prefers_terminal_result_record() {
    let raw = concat!(
        r#"{"type":"system","subtype":"init"}"#, "\n",
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"working on it"}]}}"#, "\n",
        r#"{"type":"result","result":"{\"status\":\"succeeded\",\"summary\":\"done\"}"}"#, "\n",
    );
    let text = ClaudeDriver.extract_text(raw);
    assert!(text.contains("\"succeeded\""));
}

#[test]
fn extract_falls_back_to_last_assistant_text() {
    let raw = concat!(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"first"}]}}"#, "\n",
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"second"},{"type":"tool_use","id":"t"}]}}"#, "\n",
    );
    assert_eq!(ClaudeDriver.extract_text(raw), "second");
}

#[test]
fn non_stream_output_passes_through() {
    let raw = "plain text, not stream json";
    assert_eq!(ClaudeDriver.extract_text(raw), raw);
}

#[test]
fn usage_comes_from_the_result_record() {
    let raw = concat!(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#, "\n",
        r#"{"type":"result","result":"done","usage":{"input_tokens":1200,"output_tokens":300,"cache_read_input_tokens":50}}"#, "\n",
    );
    let usage = ClaudeDriver.extract_usage(raw).unwrap();
    assert_eq!(usage.input_tokens, 1200);
    assert_eq!(usage.output_tokens, 300);
    assert_eq!(usage.cached_input_tokens, 50);
    assert_eq!(usage.source, ac_core::UsageSource::ProviderReported);
}

#[test]
fn no_usage_without_result_record() {
    assert!(ClaudeDriver.extract_usage("plain output").is_none());
}
