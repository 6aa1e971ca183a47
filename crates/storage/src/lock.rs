// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process workspace write lock.
//!
//! An exclusive advisory lock rooted at
//! `<workspace>/.local/locks/workspace.write.lock`, taken by create-exclusive
//! of a file whose payload is `{pid, acquired_at}`. A lock older than
//! [`LOCK_STALE_AFTER`] whose owner pid is dead is removed and re-raced.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::atomic::StoreError;

/// Retry cadence while waiting for the lock.
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Total time to wait before giving up with `lock_timeout`.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Age after which a lock whose owner is gone is considered stale.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize, Deserialize)]
struct LockPayload {
    pid: u32,
    /// Epoch milliseconds at acquisition.
    acquired_at: u64,
}

/// Held workspace lock; releases on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
}

impl WorkspaceLock {
    /// Acquire the write lock for `workspace_dir`.
    pub async fn acquire(workspace_dir: &Path) -> Result<Self, StoreError> {
        Self::acquire_with_timeout(workspace_dir, LOCK_TIMEOUT).await
    }

    pub async fn acquire_with_timeout(
        workspace_dir: &Path,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let lock_dir = workspace_dir.join(".local").join("locks");
        std::fs::create_dir_all(&lock_dir)?;
        let path = lock_dir.join("workspace.write.lock");

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match try_create(&path) {
                Ok(()) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if remove_if_stale(&path) {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(StoreError::LockTimeout {
                    path: path.display().to_string(),
                });
            }
            tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    let payload = LockPayload {
        pid: std::process::id(),
        acquired_at: epoch_ms(),
    };
    let bytes = serde_json::to_vec(&payload).unwrap_or_default();
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Returns true if a stale lock was removed and the caller should re-race.
fn remove_if_stale(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        // Raced with the owner's release
        return true;
    };
    let Ok(payload) = serde_json::from_slice::<LockPayload>(&bytes) else {
        // Unreadable payload: treat like any held lock until it ages out
        // via the file's own acquired_at being absent — keep waiting.
        return false;
    };

    let age_ms = epoch_ms().saturating_sub(payload.acquired_at);
    if age_ms < LOCK_STALE_AFTER.as_millis() as u64 {
        return false;
    }
    if pid_alive(payload.pid) {
        return false;
    }

    tracing::warn!(
        path = %path.display(),
        pid = payload.pid,
        age_ms,
        "removing stale workspace lock from dead process"
    );
    std::fs::remove_file(path).is_ok()
}

/// Probe liveness with a null signal.
pub(crate) fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
