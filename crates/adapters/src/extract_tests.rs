// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn whole_text_parses_first() {
    let raw = r#"{"status":"succeeded","summary":"done"}"#;
    let candidates = extract_candidates(raw);
    assert_eq!(candidates[0]["status"], "succeeded");
}

#[test]
fn bom_is_stripped() {
    let raw = "\u{feff}{\"status\":\"succeeded\",\"summary\":\"ok\"}";
    let candidates = extract_candidates(raw);
    assert!(!candidates.is_empty());
    assert_eq!(candidates[0]["summary"], "ok");
}

#[test]
fn trailing_commas_are_repaired() {
    let raw = r#"{"status":"succeeded","summary":"done","files_changed":["a.rs",],}"#;
    let value = parse_json_lenient(raw).unwrap();
    assert_eq!(value["files_changed"][0], "a.rs");
}

#[test]
fn trailing_comma_inside_string_survives() {
    let raw = r#"{"summary":"a, }","status":"ok"}"#;
    let value = parse_json_lenient(raw).unwrap();
    assert_eq!(value["summary"], "a, }");
}

#[test]
fn fenced_json_block_is_found() {
    let raw = "Here is the result:\n```json\n{\"status\":\"succeeded\",\"summary\":\"did it\"}\n```\nthanks";
    let candidates = extract_candidates(raw);
    assert!(candidates.iter().any(|c| c["summary"] == "did it"));
}

#[test]
fn multiple_fenced_blocks_in_order() {
    let raw = "```json\n{\"n\":1}\n```\nmiddle\n```json\n{\"n\":2}\n```";
    let blocks = fenced_blocks(raw);
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].contains("1"));
    assert!(blocks[1].contains("2"));
}

#[test]
fn balanced_object_inside_prose() {
    let raw = "The worker said {\"status\":\"blocked\",\"summary\":\"waiting\"} and left.";
    let candidates = extract_candidates(raw);
    assert!(candidates.iter().any(|c| c["status"] == "blocked"));
}

#[test]
fn braces_inside_strings_do_not_break_the_scan() {
    let raw = r#"noise {"summary":"use {braces} carefully","status":"ok"} tail"#;
    let objects = balanced_objects(raw);
    assert_eq!(objects.len(), 1);
    assert!(parse_json_lenient(&objects[0]).is_some());
}

#[test]
fn wrapper_keys_are_unwrapped() {
    let raw = r#"{"result":{"status":"succeeded","summary":"inner"}}"#;
    let candidates = extract_candidates(raw);
    assert!(candidates.iter().any(|c| c["summary"] == "inner"));
}

#[test]
fn json_in_string_is_parsed_repeatedly() {
    let inner = r#"{"status":"succeeded","summary":"deep"}"#;
    let wrapped = serde_json::json!({ "output": inner });
    let raw = serde_json::to_string(&wrapped).unwrap();
    let candidates = extract_candidates(&raw);
    assert!(candidates.iter().any(|c| c["summary"] == "deep"));
}

#[test]
fn deeply_nested_wrappers_unwrap() {
    let raw = r#"{"data":{"response":{"message":{"status":"failed","summary":"nested"}}}}"#;
    let candidates = extract_candidates(raw);
    assert!(candidates.iter().any(|c| c["summary"] == "nested"));
}

#[test]
fn garbage_yields_no_candidates() {
    assert!(extract_candidates("no json here at all").is_empty());
    assert!(extract_candidates("").is_empty());
}

#[test]
fn unbalanced_tail_is_ignored() {
    let raw = "{\"status\":\"ok\",\"summary\":\"s\"} {\"truncated\":";
    let candidates = extract_candidates(raw);
    assert!(candidates.iter().any(|c| c["status"] == "ok"));
}
