// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ac-adapters: provider drivers, the subscription guard, and raw-output
//! extraction for the worker result contract.

pub mod driver;
pub mod env;
pub mod extract;
pub mod pricing;
pub mod subprocess;
pub mod subscription;

pub use driver::{
    driver_for, ClaudeDriver, CodexDriver, CommandRequest, CommandSpec, DriverError, GeminiDriver,
    ResultContractMode, WorkerDriver,
};
pub use env::EnvSnapshot;
pub use extract::{extract_candidates, parse_json_lenient};
pub use pricing::{provider_reported, PricePer1k, PricingTable};
pub use subprocess::{run_with_timeout, PROBE_TIMEOUT};
pub use subscription::{
    default_policy_for, verify, AuthProbe, Channel, CliAuthProbe, ProofStrategy, ProviderPolicy,
    SubscriptionCheck,
};

#[cfg(any(test, feature = "test-support"))]
pub use subscription::FakeAuthProbe;
