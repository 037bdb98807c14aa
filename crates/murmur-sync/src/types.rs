//! Common types for reconciliation runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FailureReason;

/// Direction of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Push primary-owned fields into the workflow store.
    PrimaryToWorkflow,
    /// Write moderation decisions back to the primary store.
    WorkflowToPrimary,
}

impl Direction {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::PrimaryToWorkflow => "primary_to_workflow",
            Direction::WorkflowToPrimary => "workflow_to_primary",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "primary_to_workflow" => Ok(Direction::PrimaryToWorkflow),
            "workflow_to_primary" => Ok(Direction::WorkflowToPrimary),
            _ => Err(format!("Unknown sync direction: {s}")),
        }
    }
}

/// What a reconcile did (or would do) to the target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    /// Target document did not exist and was written.
    Created,
    /// Target record existed and was overwritten.
    Updated,
    /// Target already matched; no write issued.
    Unchanged,
    /// Dry run: would have created.
    WouldCreate,
    /// Dry run: would have updated.
    WouldUpdate,
}

impl RecordAction {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordAction::Created => "created",
            RecordAction::Updated => "updated",
            RecordAction::Unchanged => "unchanged",
            RecordAction::WouldCreate => "would_create",
            RecordAction::WouldUpdate => "would_update",
        }
    }

    /// Whether the action issued a write to the target store.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, RecordAction::Created | RecordAction::Updated)
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a record was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Workflow document whose submission does not exist in the primary store.
    Orphaned,
}

impl SkipReason {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Orphaned => "orphaned",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::Orphaned => "orphaned workflow document",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Typed result of reconciling one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Applied { action: RecordAction },
    Skipped { reason: SkipReason },
    Failed { reason: FailureReason },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn applied(action: RecordAction) -> Self {
        Self::Applied { action }
    }

    #[must_use]
    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    #[must_use]
    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed { reason }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The action taken, if applied.
    #[must_use]
    pub fn action(&self) -> Option<RecordAction> {
        match self {
            Self::Applied { action } => Some(*action),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_roundtrip() {
        for direction in [Direction::PrimaryToWorkflow, Direction::WorkflowToPrimary] {
            let parsed: Direction = direction.as_str().parse().unwrap();
            assert_eq!(parsed, direction);
        }
        assert_eq!(
            "primary-to-workflow".parse::<Direction>(),
            Ok(Direction::PrimaryToWorkflow)
        );
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_only_real_writes_count_as_writes() {
        assert!(RecordAction::Created.is_write());
        assert!(RecordAction::Updated.is_write());
        assert!(!RecordAction::Unchanged.is_write());
        assert!(!RecordAction::WouldCreate.is_write());
    }

    #[test]
    fn test_orphan_skip_reason_text() {
        assert_eq!(SkipReason::Orphaned.to_string(), "orphaned workflow document");
        assert_eq!(SkipReason::Orphaned.as_str(), "orphaned");
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(ReconcileOutcome::applied(RecordAction::Created)).unwrap();
        assert_eq!(json["outcome"], "applied");
        assert_eq!(json["action"], "created");
    }
}
