// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn cost_sums_all_token_classes() {
    let table = PricingTable::builtin();
    let usage = provider_reported(1000, 1000, 1000, 1000);
    let cost = table.cost_usd("claude", &usage).unwrap();
    // 0.003 + 0.0003 + 0.015 + 0.015
    assert!((cost - 0.0333).abs() < 1e-9, "cost was {cost}");
}

#[test]
fn unknown_provider_is_unpriced() {
    let table = PricingTable::builtin();
    let mut usage = provider_reported(1000, 0, 0, 0);
    assert!(table.cost_usd("copilot", &usage).is_none());

    table.price_usage("copilot", &mut usage);
    assert_eq!(usage.cost_usd, 0.0);
    assert_eq!(usage.cost_source, "unpriced_provider");
}

#[test]
fn price_usage_records_source() {
    let table = PricingTable::builtin();
    let mut usage = provider_reported(2000, 0, 500, 0);
    table.price_usage("codex", &mut usage);
    assert!(usage.cost_usd > 0.0);
    assert_eq!(usage.cost_source, "pricing_table:codex");
}

#[test]
fn estimated_usage_prices_like_any_other() {
    let table = PricingTable::builtin();
    let mut usage = ac_core::RunUsage::estimated_from_chars(8000, 4000);
    table.price_usage("gemini", &mut usage);
    // 2000 input tokens, 1000 output tokens
    let expected = 2.0 * 0.00125 + 1.0 * 0.01;
    assert!((usage.cost_usd - expected).abs() < 1e-9);
    assert_eq!(usage.confidence, ac_core::UsageConfidence::Low);
}

#[test]
fn custom_prices_override() {
    let mut table = PricingTable::builtin();
    table.insert(
        "claude",
        PricePer1k {
            input: 1.0,
            cached_input: 0.0,
            output: 0.0,
            reasoning_output: 0.0,
        },
    );
    let usage = provider_reported(1000, 0, 0, 0);
    assert!((table.cost_usd("claude", &usage).unwrap() - 1.0).abs() < 1e-9);
}
