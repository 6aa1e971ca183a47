// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact front-matter: Markdown files with a typed YAML header.
//!
//! Full schema validation is an external concern; the core parses only what
//! the planner, the heartbeat scheduler, and the snapshot builder need to
//! read and write.

use crate::envelope::Visibility;
use crate::id::{AgentId, ArtifactId, ContextPackId, RunId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of artifact types the kernel understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    IntakeBrief,
    ExecutivePlan,
    DepartmentPlan,
    MeetingTranscript,
    MemoryDelta,
    ManagerDigest,
    FailureReport,
    HeartbeatActionProposal,
}

impl ArtifactKind {
    /// Second-level headings the body must contain for this type.
    pub fn required_headings(&self) -> &'static [&'static str] {
        match self {
            // Transcripts are freeform
            ArtifactKind::MeetingTranscript => &[],
            ArtifactKind::HeartbeatActionProposal => &["## Summary", "## Proposed Action"],
            _ => &["## Summary"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    #[default]
    Normal,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    Rejected,
}

/// One review decision appended to an artifact's header. The latest entry
/// wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub decision: ReviewOutcome,
    pub reviewer: String,
    pub at: String,
}

/// YAML front-matter of an artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub id: ArtifactId,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub title: String,
    pub visibility: Visibility,
    pub produced_by: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_pack_id: Option<ContextPackId>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Memory deltas patch exactly one file; empty for other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review: Vec<ReviewDecision>,
}

impl ArtifactHeader {
    /// The latest review decision, if any.
    pub fn latest_review(&self) -> Option<&ReviewDecision> {
        self.review.last()
    }

    pub fn is_approved(&self) -> bool {
        matches!(
            self.latest_review().map(|r| r.decision),
            Some(ReviewOutcome::Approved)
        )
    }
}

#[derive(Debug, Error)]
pub enum ArtifactParseError {
    #[error("missing front-matter fences")]
    MissingFences,
    #[error("front-matter: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
    #[error("body is missing required heading {heading:?}")]
    MissingHeading { heading: &'static str },
}

impl ArtifactParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ArtifactParseError::MissingHeading { .. } => "missing_heading",
            _ => "frontmatter",
        }
    }
}

/// Split a Markdown document into `(header, body)` and validate that the
/// body carries the headings its type demands.
pub fn parse_artifact(text: &str) -> Result<(ArtifactHeader, &str), ArtifactParseError> {
    let rest = text
        .strip_prefix("---\n")
        .ok_or(ArtifactParseError::MissingFences)?;
    let (front, body) = rest
        .split_once("\n---\n")
        .ok_or(ArtifactParseError::MissingFences)?;
    let header: ArtifactHeader = serde_yaml::from_str(front)?;

    for heading in header.kind.required_headings() {
        let with_title = format!("{heading} ");
        let present = body
            .lines()
            .any(|line| line.trim_end() == *heading || line.starts_with(&with_title));
        if !present {
            return Err(ArtifactParseError::MissingHeading { heading });
        }
    }
    Ok((header, body))
}

/// Render an artifact file from its header and body.
pub fn render_artifact(header: &ArtifactHeader, body: &str) -> Result<String, serde_yaml::Error> {
    let front = serde_yaml::to_string(header)?;
    Ok(format!("---\n{front}---\n{body}"))
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
