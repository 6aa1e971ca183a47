// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable session records.
//!
//! One YAML file per session under `.local/sessions/`, named by the
//! url-encoded session ref. Records survive control-plane restarts and are
//! the basis for orphan reconciliation and detached stop.

use ac_core::{ProjectId, RunId, RunStatus, SessionRef};
use serde::{Deserialize, Serialize};

use crate::atomic::{Store, StoreError, WriteOpts};
use crate::layout::WorkspacePaths;

/// The persisted shape of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_ref: SessionRef,
    pub run_id: RunId,
    pub project_id: ProjectId,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// When the pid above was observed; stop refuses pids claimed too
    /// long ago (they may have been recycled by the OS).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_claimed_at_ms: Option<u64>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub output_relpaths: Vec<String>,
    /// sha256 over the launch argv, for post-hoc provenance.
    pub argv_digest: String,
}

/// File-per-record store for session records.
#[derive(Clone)]
pub struct SessionStore {
    store: Store,
}

impl SessionStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn save(
        &self,
        workspace: &WorkspacePaths,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let path = workspace.session_record_path(&record.session_ref);
        self.store
            .write_yaml(&path, record, WriteOpts::default())
            .await
    }

    pub fn load(
        &self,
        workspace: &WorkspacePaths,
        session_ref: &SessionRef,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let path = workspace.session_record_path(session_ref);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.store.read_yaml(&path)?))
    }

    /// Every parseable record in the sessions directory.
    pub fn list(&self, workspace: &WorkspacePaths) -> Vec<SessionRecord> {
        let dir = workspace.sessions_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            match self.store.read_yaml::<SessionRecord>(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session record");
                }
            }
        }
        records.sort_by(|a, b| a.session_ref.cmp(&b.session_ref));
        records
    }
}

/// sha256 digest over launch argv, newline-delimited.
pub fn argv_digest(argv: &[String]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for arg in argv {
        hasher.update(arg.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

impl SessionRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
