// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{RunId, SessionRef};

#[test]
fn fresh_ids_carry_kind_prefix() {
    let id_gen = UuidIdGen;
    let run = RunId::fresh(&id_gen);
    assert!(run.as_str().starts_with("run_"));

    let art = crate::ArtifactId::fresh(&id_gen);
    assert!(art.as_str().starts_with("art_"));
}

#[test]
fn fresh_ids_are_unique() {
    let id_gen = UuidIdGen;
    let a = RunId::fresh(&id_gen);
    let b = RunId::fresh(&id_gen);
    assert_ne!(a, b);
}

#[test]
fn sequential_gen_is_deterministic() {
    let id_gen = SequentialIdGen::new();
    assert_eq!(RunId::fresh(&id_gen).as_str(), "run_00000001");
    assert_eq!(RunId::fresh(&id_gen).as_str(), "run_00000002");
}

#[test]
fn ids_round_trip_through_strings() {
    let id = RunId::new("run_abc123");
    assert_eq!(id, "run_abc123");
    assert_eq!(id.to_string(), "run_abc123");
    let back: RunId = "run_abc123".into();
    assert_eq!(back, id);
}

#[test]
fn local_session_ref_embeds_run_id() {
    let run = RunId::new("run_42");
    assert_eq!(SessionRef::local(&run).as_str(), "local_run_42");
}

#[test]
fn ids_serialize_as_plain_strings() {
    let id = RunId::new("run_x");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"run_x\"");
}
