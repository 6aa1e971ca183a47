// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the heartbeat config and state singletons.
//!
//! Both live at well-known paths under `.local/heartbeat/`. State updates
//! are read-modify-write under the workspace lock so concurrent ticks and
//! operators see a self-consistent snapshot.

use ac_core::{HeartbeatConfig, HeartbeatState};

use crate::atomic::{Store, StoreError, WriteOpts};
use crate::layout::WorkspacePaths;
use crate::lock::WorkspaceLock;

#[derive(Clone)]
pub struct HeartbeatStore {
    store: Store,
}

impl HeartbeatStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Load the config, defaulting when the file is absent.
    pub fn load_config(&self, workspace: &WorkspacePaths) -> Result<HeartbeatConfig, StoreError> {
        let path = workspace.heartbeat_config_path();
        if !path.exists() {
            return Ok(HeartbeatConfig::default());
        }
        self.store.read_yaml(&path)
    }

    pub async fn save_config(
        &self,
        workspace: &WorkspacePaths,
        config: &HeartbeatConfig,
    ) -> Result<(), StoreError> {
        self.store
            .write_yaml(&workspace.heartbeat_config_path(), config, WriteOpts::default())
            .await
    }

    /// Load the durable state, defaulting when the file is absent.
    pub fn load_state(&self, workspace: &WorkspacePaths) -> Result<HeartbeatState, StoreError> {
        let path = workspace.heartbeat_state_path();
        if !path.exists() {
            return Ok(HeartbeatState::default());
        }
        self.store.read_yaml(&path)
    }

    /// Read-modify-write the state under the workspace lock.
    pub async fn update_state<F>(
        &self,
        workspace: &WorkspacePaths,
        mutate: F,
    ) -> Result<HeartbeatState, StoreError>
    where
        F: FnOnce(&mut HeartbeatState),
    {
        let _lock = WorkspaceLock::acquire(workspace.root()).await?;
        let mut state = self.load_state(workspace)?;
        mutate(&mut state);
        // The workspace lock is already held; avoid re-acquiring it.
        self.store
            .write_yaml(
                &workspace.heartbeat_state_path(),
                &state,
                WriteOpts {
                    workspace_lock: false,
                },
            )
            .await?;
        Ok(state)
    }
}

#[cfg(test)]
#[path = "heartbeat_store_tests.rs"]
mod tests;
