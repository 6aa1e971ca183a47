// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kind-prefixed identifier types.
//!
//! Every entity in a workspace is addressable by a kind-prefixed string id
//! (`run_…`, `job_…`, `art_…`). The prefix is applied at construction time
//! by `fresh()`; ids read back from disk are accepted verbatim.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates the random tail of fresh identifiers.
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// UUID-based generator for production use.
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Sequential generator for deterministic tests.
#[derive(Clone)]
pub struct SequentialIdGen {
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        format!("{:08}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

/// Define a newtype ID wrapper around `String` with a kind prefix.
///
/// Generates `new()`, `fresh()`, `as_str()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, and `Borrow<str>` implementations.
/// `fresh()` produces `<prefix>_<gen.next()>`.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident, prefix = $prefix:literal;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing id read back from disk.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh kind-prefixed id.
            pub fn fresh(id_gen: &impl $crate::id::IdGen) -> Self {
                Self(format!(concat!($prefix, "_{}"), id_gen.next()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// One worker invocation; owns an events file and an outputs directory.
    pub struct RunId, prefix = "run";
}

define_id! {
    /// A unit of worker work submitted through the launch lane.
    pub struct JobId, prefix = "job";
}

define_id! {
    /// A Markdown artifact with typed YAML front-matter.
    pub struct ArtifactId, prefix = "art";
}

define_id! {
    /// An immutable context pack materialized for a run.
    pub struct ContextPackId, prefix = "ctx";
}

define_id! {
    /// A project directory under `work/projects/`.
    pub struct ProjectId, prefix = "proj";
}

define_id! {
    /// A governed agent under `org/agents/`.
    pub struct AgentId, prefix = "agent";
}

define_id! {
    /// A team under `org/teams/`.
    pub struct TeamId, prefix = "team";
}

define_id! {
    /// A task file under a project's `tasks/`.
    pub struct TaskId, prefix = "task";
}

define_id! {
    /// Key of a session record; durable across control-plane restarts.
    pub struct SessionRef, prefix = "sess";
}

impl SessionRef {
    /// Default session ref for a run: `local_<run_id>`.
    pub fn local(run_id: &RunId) -> Self {
        Self(format!("local_{}", run_id))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
