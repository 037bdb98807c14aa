//! Record model adapter: maps submissions between the two store shapes.
//!
//! Field ownership:
//!
//! | Field | Owner |
//! |---|---|
//! | username, content, contentSanitized, audioUrl, createdAt, risk, color | primary |
//! | status, moderatorNotes, approvedAt, tags, categories | workflow |
//! | showOnHomepage | workflow once set, seeded from primary while unset |
//!
//! Both mappings are pure and total. Callers reject records without a
//! usable identifier before calling in.

use murmur_store::{PrimaryUpdate, Submission, WorkflowDocument};

/// Maps submissions between primary and workflow representations.
pub struct RecordAdapter;

impl RecordAdapter {
    /// Build the workflow document for `submission`, merged with the
    /// document currently stored for it, if any.
    ///
    /// Primary-owned fields always come from `submission`. Workflow-owned
    /// fields come from `existing`; a new document is seeded from the
    /// primary record, so it starts in the primary's (normally pending)
    /// state and a moderation decision is never downgraded.
    #[must_use]
    pub fn to_workflow_document(
        submission: &Submission,
        existing: Option<&WorkflowDocument>,
    ) -> WorkflowDocument {
        let (status, moderator_notes, approved_at, tags, categories, show_on_homepage) =
            match existing {
                Some(doc) => (
                    doc.status,
                    doc.moderator_notes.clone(),
                    doc.approved_at,
                    doc.tags.clone(),
                    doc.categories.clone(),
                    doc.show_on_homepage.or(submission.show_on_homepage),
                ),
                None => (
                    submission.status,
                    submission.moderator_notes.clone(),
                    submission.approved_at,
                    submission.tags.clone(),
                    Vec::new(),
                    submission.show_on_homepage,
                ),
            };

        WorkflowDocument {
            submission_id: submission.id.clone(),
            username: submission.username.clone(),
            content: submission.content.clone(),
            content_sanitized: submission.content_sanitized.clone(),
            audio_url: submission.audio_url.clone(),
            created_at: submission.created_at,
            color: submission.color.clone(),
            risk: Some(submission.risk.clone()),
            status,
            moderator_notes,
            approved_at,
            show_on_homepage,
            tags,
            categories,
        }
    }

    /// Project the workflow-owned fields of `document` into a primary update.
    ///
    /// An unset homepage flag on the document keeps the primary's value.
    #[must_use]
    pub fn to_primary_update(document: &WorkflowDocument, existing: &Submission) -> PrimaryUpdate {
        PrimaryUpdate {
            status: document.status,
            moderator_notes: document.moderator_notes.clone(),
            approved_at: document.approved_at,
            show_on_homepage: document.show_on_homepage.or(existing.show_on_homepage),
            tags: document.tags.clone(),
        }
    }
}
