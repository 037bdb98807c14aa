//! Submission domain model.
//!
//! A submission lives in two stores. The primary store owns identity and
//! content; the workflow store owns moderation decisions. The types here
//! are the typed representations of both sides plus the partial update the
//! engine is allowed to write back to the primary store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable submission identifier, generated by the primary store.
///
/// Used as the join key in the workflow store.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    /// Create a new identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is usable as a join key.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubmissionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubmissionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Publication status of a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Awaiting moderation.
    #[default]
    Pending,
    /// Approved for publication.
    Approved,
    /// Rejected by a moderator.
    Rejected,
}

impl SubmissionStatus {
    /// Database/wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

/// Risk and sentiment flags computed by the primary store on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFlags {
    /// Content was flagged by automated screening.
    #[serde(default)]
    pub flagged: bool,
    /// Sentiment label, if computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// A submission as held by the primary (transactional) store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,

    // Primary-owned fields
    /// Author reference.
    pub username: String,
    pub content: String,
    pub content_sanitized: String,
    /// Synthesized-audio reference.
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub risk: RiskFlags,
    /// Display color token.
    pub color: String,

    // Workflow-owned fields, written back by the engine
    pub status: SubmissionStatus,
    pub moderator_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    /// `None` means no explicit homepage preference.
    pub show_on_homepage: Option<bool>,
    pub tags: Vec<String>,
}

impl Submission {
    /// Create a fresh pending submission with no moderation state.
    pub fn new(
        id: impl Into<SubmissionId>,
        username: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            username: username.into(),
            content_sanitized: content.clone(),
            content,
            audio_url: None,
            created_at,
            risk: RiskFlags::default(),
            color: String::new(),
            status: SubmissionStatus::Pending,
            moderator_notes: None,
            approved_at: None,
            show_on_homepage: None,
            tags: Vec::new(),
        }
    }

    /// Apply a workflow-owned update in place.
    pub fn apply_update(&mut self, update: &PrimaryUpdate) {
        self.status = update.status;
        self.moderator_notes.clone_from(&update.moderator_notes);
        self.approved_at = update.approved_at;
        self.show_on_homepage = update.show_on_homepage;
        self.tags.clone_from(&update.tags);
    }

    /// Current values of the workflow-owned fields.
    #[must_use]
    pub fn workflow_fields(&self) -> PrimaryUpdate {
        PrimaryUpdate {
            status: self.status,
            moderator_notes: self.moderator_notes.clone(),
            approved_at: self.approved_at,
            show_on_homepage: self.show_on_homepage,
            tags: self.tags.clone(),
        }
    }
}

/// A submission document as persisted in the workflow store.
///
/// Unknown fields returned by the store are ignored on decode. A document
/// without a `submissionId` decodes with an empty identifier and is
/// rejected by the engine before it reaches the mapping layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    #[serde(default)]
    pub submission_id: SubmissionId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_sanitized: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderator_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Absent means "unset, inherit from primary".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_on_homepage: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub color: String,
    /// Risk and sentiment flags copied from the primary record. Primary-owned;
    /// never written back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskFlags>,
}

/// Partial update of the workflow-owned columns of a primary submission.
///
/// Carries no primary-owned field, so it cannot overwrite authoritative
/// content by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryUpdate {
    pub status: SubmissionStatus,
    pub moderator_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub show_on_homepage: Option<bool>,
    pub tags: Vec<String>,
}
