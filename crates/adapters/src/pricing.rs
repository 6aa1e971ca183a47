// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider pricing and run cost computation.

use ac_core::{RunUsage, UsageConfidence, UsageSource};
use std::collections::HashMap;

/// USD per 1k tokens, by token class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePer1k {
    pub input: f64,
    pub cached_input: f64,
    pub output: f64,
    pub reasoning_output: f64,
}

/// Per-provider pricing table.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    prices: HashMap<String, PricePer1k>,
}

impl PricingTable {
    /// Built-in prices for the covered providers.
    pub fn builtin() -> Self {
        let mut prices = HashMap::new();
        prices.insert(
            "codex".to_string(),
            PricePer1k {
                input: 0.00125,
                cached_input: 0.000125,
                output: 0.01,
                reasoning_output: 0.01,
            },
        );
        prices.insert(
            "claude".to_string(),
            PricePer1k {
                input: 0.003,
                cached_input: 0.0003,
                output: 0.015,
                reasoning_output: 0.015,
            },
        );
        prices.insert(
            "gemini".to_string(),
            PricePer1k {
                input: 0.00125,
                cached_input: 0.0003125,
                output: 0.01,
                reasoning_output: 0.01,
            },
        );
        Self { prices }
    }

    pub fn insert(&mut self, provider: impl Into<String>, price: PricePer1k) {
        self.prices.insert(provider.into(), price);
    }

    pub fn price_for(&self, provider: &str) -> Option<&PricePer1k> {
        self.prices.get(provider)
    }

    /// Cost in USD for the given token counts; `None` for unknown providers.
    pub fn cost_usd(&self, provider: &str, usage: &RunUsage) -> Option<f64> {
        let price = self.price_for(provider)?;
        let cost = usage.input_tokens as f64 / 1000.0 * price.input
            + usage.cached_input_tokens as f64 / 1000.0 * price.cached_input
            + usage.output_tokens as f64 / 1000.0 * price.output
            + usage.reasoning_output_tokens as f64 / 1000.0 * price.reasoning_output;
        Some(cost)
    }

    /// Fill `cost_usd`/`cost_source` in-place from this table.
    pub fn price_usage(&self, provider: &str, usage: &mut RunUsage) {
        match self.cost_usd(provider, usage) {
            Some(cost) => {
                usage.cost_usd = cost;
                usage.cost_source = format!("pricing_table:{provider}");
            }
            None => {
                usage.cost_usd = 0.0;
                usage.cost_source = "unpriced_provider".to_string();
            }
        }
    }
}

/// Provider-reported usage with high confidence.
pub fn provider_reported(
    input_tokens: u64,
    cached_input_tokens: u64,
    output_tokens: u64,
    reasoning_output_tokens: u64,
) -> RunUsage {
    RunUsage {
        source: UsageSource::ProviderReported,
        confidence: UsageConfidence::High,
        input_tokens,
        cached_input_tokens,
        output_tokens,
        reasoning_output_tokens,
        cost_usd: 0.0,
        cost_source: "provider".to_string(),
    }
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;
