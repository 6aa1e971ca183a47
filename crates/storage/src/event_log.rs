// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hash-chained, append-only event log.
//!
//! Each run owns one `events.jsonl`: UTF-8, one canonical-JSON envelope per
//! line, newline-terminated, never rewritten. For every envelope,
//! `event_hash = sha256(canonical(envelope without event_hash))` and
//! `prev_event_hash` is the previous line's hash (null at the head).
//!
//! Appends per file are strictly ordered through the store's per-path
//! queue; the last hash is cached per path and reloaded on the first
//! append after a restart. Readers tolerate malformed trailing lines
//! (a crash mid-append leaves at most one).

use ac_core::{canonical_json, Clock, EventDraft, EventEnvelope, RunId, SessionRef,
    ENVELOPE_SCHEMA_VERSION};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex as SyncMutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::atomic::{Store, StoreError};
use crate::bus::EventBus;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl EventLogError {
    pub fn code(&self) -> &'static str {
        match self {
            EventLogError::Store(e) => e.code(),
            EventLogError::Serialize(_) => "io_error",
        }
    }
}

/// Result of folding a chain verification over an events file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChainReport {
    pub total_lines: usize,
    pub valid_events: usize,
    pub parse_errors: usize,
    pub chain_intact: bool,
    /// 1-based line number of the first hash break, if any.
    pub first_break: Option<usize>,
}

/// The per-workspace event log writer.
#[derive(Clone)]
pub struct EventLog<C: Clock> {
    clock: C,
    store: Store,
    bus: EventBus,
    origin: Instant,
    last_hash: Arc<SyncMutex<HashMap<PathBuf, String>>>,
}

impl<C: Clock> EventLog<C> {
    pub fn new(store: Store, bus: EventBus, clock: C) -> Self {
        let origin = clock.now();
        Self {
            clock,
            store,
            bus,
            origin,
            last_hash: Arc::new(SyncMutex::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Create an empty events file if the run directory lacks one.
    pub fn ensure_run_files(&self, run_dir: &Path) -> Result<(), EventLogError> {
        let events = run_dir.join("events.jsonl");
        if !events.exists() {
            std::fs::create_dir_all(run_dir).map_err(StoreError::from)?;
            std::fs::write(&events, b"").map_err(StoreError::from)?;
        }
        Ok(())
    }

    /// Append a draft to `events_path`, completing the envelope and the
    /// hash chain, then publish to the bus.
    pub async fn append(
        &self,
        events_path: &Path,
        run_id: &RunId,
        session_ref: &SessionRef,
        draft: EventDraft,
    ) -> Result<EventEnvelope, EventLogError> {
        let queue = self.store.queue_for(events_path);
        let _serialized = queue.lock().await;

        let prev = self.chain_tail(events_path);

        let mut envelope = EventEnvelope {
            schema_version: ENVELOPE_SCHEMA_VERSION,
            event_id: format!("evt_{}", uuid::Uuid::new_v4().simple()),
            correlation_id: draft
                .correlation_id
                .unwrap_or_else(|| session_ref.as_str().to_string()),
            causation_id: draft.causation_id,
            ts_wallclock: iso_from_epoch_ms(self.clock.epoch_ms()),
            ts_monotonic_ms: self.clock.now().duration_since(self.origin).as_millis() as u64,
            run_id: run_id.clone(),
            session_ref: session_ref.clone(),
            actor: draft.actor,
            visibility: draft.visibility,
            event_type: draft.event_type,
            payload: draft.payload,
            prev_event_hash: prev,
            event_hash: None,
        };

        let hash = hash_envelope(&envelope)?;
        envelope.event_hash = Some(hash.clone());

        let mut line = canonical_json(&envelope)?;
        line.push('\n');
        self.store.append_raw(events_path, line.as_bytes())?;

        self.last_hash
            .lock()
            .insert(events_path.to_path_buf(), hash);
        self.bus.publish(&envelope);

        tracing::debug!(
            event_type = %envelope.event_type,
            run_id = %envelope.run_id,
            path = %events_path.display(),
            "event appended"
        );
        Ok(envelope)
    }

    /// Did this run's events file already record an event of `event_type`?
    pub fn has_event(&self, events_path: &Path, event_type: &str) -> bool {
        read_envelopes(events_path)
            .iter()
            .any(|e| e.event_type == event_type)
    }

    /// Drop the last-hash cache (and shared path queues) to simulate a
    /// control-plane restart in tests.
    pub fn reset_for_tests(&self) {
        self.last_hash.lock().clear();
        self.store.reset_for_tests();
    }

    fn chain_tail(&self, events_path: &Path) -> Option<String> {
        if let Some(hash) = self.last_hash.lock().get(events_path) {
            return Some(hash.clone());
        }
        let tail = load_tail_hash(events_path);
        if let Some(ref hash) = tail {
            self.last_hash
                .lock()
                .insert(events_path.to_path_buf(), hash.clone());
        }
        tail
    }
}

fn hash_envelope(envelope: &EventEnvelope) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(&envelope.without_hash())?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn iso_from_epoch_ms(ms: u64) -> String {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| "1970-01-01T00:00:00.000Z".to_string())
}

/// Parse every well-formed envelope in the file, skipping malformed lines.
pub fn read_envelopes(path: &Path) -> Vec<EventEnvelope> {
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    let reader = std::io::BufReader::new(file);
    let mut envelopes = Vec::new();
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Ok(envelope) = serde_json::from_str::<EventEnvelope>(trimmed) {
            envelopes.push(envelope);
        }
    }
    envelopes
}

/// Hash of the last well-formed line, skipping a malformed tail.
fn load_tail_hash(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    text.lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .find_map(|l| {
            serde_json::from_str::<EventEnvelope>(l.trim())
                .ok()
                .and_then(|e| e.event_hash)
        })
}

/// Recompute the full chain fold for one events file.
pub fn verify_chain(path: &Path) -> ChainReport {
    let Ok(text) = std::fs::read_to_string(path) else {
        return ChainReport::default();
    };

    let mut report = ChainReport {
        chain_intact: true,
        ..ChainReport::default()
    };
    let mut prev_hash: Option<String> = None;

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.total_lines += 1;

        let Ok(envelope) = serde_json::from_str::<EventEnvelope>(trimmed) else {
            report.parse_errors += 1;
            continue;
        };
        report.valid_events += 1;

        let recomputed = hash_envelope(&envelope).ok();
        let links = envelope.prev_event_hash == prev_hash;
        let hashes = recomputed.is_some() && recomputed == envelope.event_hash;
        if !(links && hashes) && report.first_break.is_none() {
            report.chain_intact = false;
            report.first_break = Some(index + 1);
        }
        prev_hash = envelope.event_hash;
    }
    report
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
