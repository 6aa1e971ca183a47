// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON candidate extraction from raw worker output.
//!
//! Workers are told to print strict JSON; real output is markdown with
//! fences, wrapper objects, log noise, or nothing at all. The extractor
//! tries, in order: the whole text, fenced ```json blocks, balanced
//! `{…}` objects, and recursive unwrapping of common wrapper keys with
//! repeated parsing of JSON-in-string payloads. A lenient repair pass
//! (BOM strip, trailing commas) is applied wherever strict parsing fails.

use serde_json::Value;

/// Wrapper keys providers and SDKs like to bury results under.
const WRAPPER_KEYS: &[&str] = &[
    "structured_output",
    "result",
    "response",
    "payload",
    "data",
    "output",
    "message",
    "content",
    "text",
    "completion",
    "delta",
];

/// Depth bound for recursive unwrapping.
const MAX_UNWRAP_DEPTH: usize = 8;

pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Remove trailing commas before `}` / `]`, outside of strings.
pub fn strip_trailing_commas(s: &str) -> String {
    let bytes: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                // Peek past whitespace for a closing bracket
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && (bytes[j] == '}' || bytes[j] == ']') {
                    i += 1; // drop the comma
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Strict parse, then a lenient repair pass.
pub fn parse_json_lenient(s: &str) -> Option<Value> {
    let s = strip_bom(s).trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Some(v);
    }
    serde_json::from_str(&strip_trailing_commas(s)).ok()
}

/// Contents of fenced ```json code blocks (and bare ``` fences).
pub fn fenced_blocks(s: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // Skip the info string (e.g. "json") up to the first newline
        let Some(newline) = after_fence.find('\n') else {
            break;
        };
        let body = &after_fence[newline + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(body[..close].trim().to_string());
        rest = &body[close + 3..];
    }
    blocks
}

/// Balanced `{…}` object substrings, string-aware.
pub fn balanced_objects(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut objects = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '{' {
            i += 1;
            continue;
        }
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let start = i;
        let mut end = None;
        for (offset, &c) in chars[start..].iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(start + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(end) => {
                objects.push(chars[start..=end].iter().collect());
                i = end + 1;
            }
            None => break, // unbalanced tail
        }
    }
    objects
}

/// Push `value` and everything reachable through wrapper keys.
///
/// String payloads are parsed repeatedly: `"{\"status\":…}"` unwraps to the
/// inner object, however many quoting layers deep.
fn push_with_unwrapped(value: Value, out: &mut Vec<Value>, depth: usize) {
    if depth > MAX_UNWRAP_DEPTH {
        return;
    }
    match &value {
        Value::Object(map) => {
            let inner: Vec<Value> = WRAPPER_KEYS
                .iter()
                .filter_map(|k| map.get(*k).cloned())
                .collect();
            out.push(value);
            for v in inner {
                push_with_unwrapped(v, out, depth + 1);
            }
        }
        Value::String(s) => {
            if let Some(parsed) = parse_json_lenient(s) {
                push_with_unwrapped(parsed, out, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items.clone() {
                push_with_unwrapped(item, out, depth + 1);
            }
        }
        _ => {}
    }
}

/// The full extraction ladder, in candidate order.
pub fn extract_candidates(raw: &str) -> Vec<Value> {
    let raw = strip_bom(raw);
    let mut candidates = Vec::new();

    if let Some(whole) = parse_json_lenient(raw) {
        push_with_unwrapped(whole, &mut candidates, 0);
    }
    for block in fenced_blocks(raw) {
        if let Some(v) = parse_json_lenient(&block) {
            push_with_unwrapped(v, &mut candidates, 0);
        }
    }
    for object in balanced_objects(raw) {
        if let Some(v) = parse_json_lenient(&object) {
            push_with_unwrapped(v, &mut candidates, 0);
        }
    }
    candidates
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
