// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-safe write primitives.
//!
//! Three primitives used by every writer: `write_atomic` (temp + fsync +
//! rename + directory fsync), `append_atomic` (open-append-write-fsync),
//! and `path_exists`. Writes are crash-consistent at the rename boundary.
//!
//! Two serialization layers apply: the cross-process workspace lock
//! (optional, see [`crate::lock`]) and a per-absolute-path queue so
//! concurrent callers within one process never interleave writes to the
//! same file.

use parking_lot::Mutex as SyncMutex;
use rand::Rng;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::layout::find_workspace_root;
use crate::lock::WorkspaceLock;

/// Errors from the workspace store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workspace lock timed out: {path}")]
    LockTimeout { path: String },
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Stable error code for events and snapshots.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "io_error",
            StoreError::LockTimeout { .. } => "lock_timeout",
            StoreError::Yaml(_) | StoreError::Json(_) => "schema_invalid",
        }
    }
}

/// Options for a single write.
#[derive(Debug, Clone, Copy)]
pub struct WriteOpts {
    /// Take the workspace lock for the duration of the write. On by
    /// default for whole-file writes, off by default for appends.
    pub workspace_lock: bool,
}

impl Default for WriteOpts {
    fn default() -> Self {
        Self {
            workspace_lock: true,
        }
    }
}

/// The atomic workspace store. Cheap to clone; clones share the per-path
/// write queues.
#[derive(Clone, Default)]
pub struct Store {
    queues: Arc<SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialization guard for one absolute path.
    pub(crate) fn queue_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut queues = self.queues.lock();
        queues.entry(path.to_path_buf()).or_default().clone()
    }

    /// Drop all per-path queues, simulating a process restart in tests.
    pub fn reset_for_tests(&self) {
        self.queues.lock().clear();
    }

    /// Write `bytes` to `path` atomically: temp file, fsync, rename onto
    /// the target, fsync the containing directory.
    pub async fn write_atomic(
        &self,
        path: &Path,
        bytes: &[u8],
        opts: WriteOpts,
    ) -> Result<(), StoreError> {
        let queue = self.queue_for(path);
        let _serialized = queue.lock().await;
        let _ws_lock = self.maybe_lock(path, opts).await?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        let result = write_via_temp(path, &tmp, bytes);
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result.map_err(Into::into)
    }

    /// Append `bytes` to `path`: open-append-write-fsync-close, then fsync
    /// the containing directory.
    pub async fn append_atomic(
        &self,
        path: &Path,
        bytes: &[u8],
        opts: WriteOpts,
    ) -> Result<(), StoreError> {
        let queue = self.queue_for(path);
        let _serialized = queue.lock().await;
        let _ws_lock = self.maybe_lock(path, opts).await?;

        self.append_raw(path, bytes)
    }

    /// Stat-based existence probe.
    pub fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Append without taking the per-path queue. For callers that already
    /// hold the queue for `path` (the event log's chained appends).
    pub(crate) fn append_raw(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        if let Some(parent) = path.parent() {
            fsync_dir(parent)?;
        }
        Ok(())
    }

    /// Convenience: serialize as YAML and write atomically.
    pub async fn write_yaml<T: serde::Serialize>(
        &self,
        path: &Path,
        value: &T,
        opts: WriteOpts,
    ) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(value)?;
        self.write_atomic(path, yaml.as_bytes(), opts).await
    }

    /// Convenience: read and parse a YAML file.
    pub fn read_yaml<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    async fn maybe_lock(
        &self,
        path: &Path,
        opts: WriteOpts,
    ) -> Result<Option<WorkspaceLock>, StoreError> {
        if !opts.workspace_lock {
            return Ok(None);
        }
        // A path outside any workspace is a standalone file: skip the lock.
        let start = path.parent().unwrap_or(path);
        match find_workspace_root(start) {
            Some(workspace) => Ok(Some(WorkspaceLock::acquire(&workspace).await?)),
            None => Ok(None),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let rand_tail: u32 = rand::rng().random();
    let tmp_name = format!(
        ".{basename}.tmp-{}-{}-{rand_tail:08x}",
        std::process::id(),
        epoch_ms(),
    );
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

fn write_via_temp(path: &Path, tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(tmp, path)?;

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }
    Ok(())
}

/// Fsync a directory so a rename or append within it is durable.
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let handle = std::fs::File::open(dir)?;
    handle.sync_all()
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
