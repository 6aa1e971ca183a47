// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ac-storage: the atomic workspace store every other subsystem sits on.
//!
//! All canonical state is files under a workspace directory. This crate
//! owns the crash-consistent write primitives (atomic rename + directory
//! fsync + workspace lock + per-file append queues), the hash-chained
//! event log, and the durable session / heartbeat records.

pub mod atomic;
pub mod bus;
pub mod event_log;
pub mod heartbeat_store;
pub mod layout;
pub mod lock;
pub mod session_store;

pub use atomic::{Store, StoreError, WriteOpts};
pub use bus::EventBus;
pub use event_log::{read_envelopes, verify_chain, ChainReport, EventLog, EventLogError};
pub use heartbeat_store::HeartbeatStore;
pub use layout::{find_workspace_root, init_workspace, WorkspacePaths};
pub use lock::{WorkspaceLock, LOCK_RETRY_INTERVAL, LOCK_STALE_AFTER, LOCK_TIMEOUT};
pub use session_store::{argv_digest, SessionRecord, SessionStore};
