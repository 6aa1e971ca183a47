// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret scanning for the context planner.
//!
//! A small bank of patterns; any match on a ref's displayed surface
//! filters it out of the context plan. Counts are reported per kind so
//! the plan trace can say what was dropped.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One named pattern in the bank.
struct SecretPattern {
    kind: &'static str,
    regex: Regex,
}

fn bank() -> &'static Vec<SecretPattern> {
    static BANK: OnceLock<Vec<SecretPattern>> = OnceLock::new();
    BANK.get_or_init(|| {
        let patterns: &[(&str, &str)] = &[
            ("openai_key", r"sk-[A-Za-z0-9_\-]{20,}"),
            ("github_token", r"gh[pousr]_[A-Za-z0-9]{20,}"),
            ("slack_token", r"xox[baprs]-[A-Za-z0-9\-]{10,}"),
            ("bearer_token", r"(?i)bearer\s+[A-Za-z0-9._\-]{16,}"),
            (
                "generic_assignment",
                r#"(?i)\b(api_key|token|secret|password)\b\s*[:=]\s*['"]?[^\s'"]{6,}"#,
            ),
        ];
        patterns
            .iter()
            .filter_map(|&(kind, pattern)| {
                Regex::new(pattern).ok().map(|regex| SecretPattern { kind, regex })
            })
            .collect()
    })
}

/// Count matches per pattern kind. Empty map means clean.
pub fn scan(text: &str) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for pattern in bank() {
        let n = pattern.regex.find_iter(text).count();
        if n > 0 {
            counts.insert(pattern.kind, n);
        }
    }
    counts
}

/// True when any pattern matches.
pub fn contains_secret(text: &str) -> bool {
    bank().iter().any(|p| p.regex.is_match(text))
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
