//! Store traits
//!
//! Capability traits for the two record stores the engine reconciles.
//! Both are object safe so the engine can hold `Arc<dyn ...>` handles and
//! tests can swap in isolated doubles.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{PrimaryUpdate, Submission, SubmissionId, WorkflowDocument};
use crate::query::{Page, PageRequest, SubmissionFilter};

/// The transactional system of record for submission content and identity.
///
/// Read-only from the engine's perspective except for the workflow-owned
/// columns carried by [`PrimaryUpdate`].
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// List submissions matching `filter`, newest first.
    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Submission>>;

    /// Count submissions matching `filter`.
    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64>;

    /// Get a single submission by id.
    async fn get_submission(&self, id: &SubmissionId) -> StoreResult<Option<Submission>>;

    /// Update the workflow-owned columns of a submission.
    ///
    /// Returns `NotFound` if no submission has this id.
    async fn update_submission(&self, id: &SubmissionId, update: &PrimaryUpdate)
        -> StoreResult<()>;
}

/// The system of record for moderation and publication decisions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// List documents matching `filter`, newest first.
    async fn list_documents(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<WorkflowDocument>>;

    /// Count documents matching `filter`.
    async fn count_documents(&self, filter: &SubmissionFilter) -> StoreResult<u64>;

    /// Find the document for a submission.
    async fn find_document(&self, id: &SubmissionId) -> StoreResult<Option<WorkflowDocument>>;

    /// Find the documents for a set of submissions. Missing ids are omitted.
    async fn find_documents(&self, ids: &[SubmissionId]) -> StoreResult<Vec<WorkflowDocument>>;

    /// Create the document if absent, else replace it.
    async fn create_or_replace(&self, document: &WorkflowDocument) -> StoreResult<()>;

    /// Whether [`WorkflowStore::commit_transaction`] is available.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Create-or-replace every document atomically: all or none are written.
    async fn commit_transaction(&self, documents: &[WorkflowDocument]) -> StoreResult<()> {
        let _ = documents;
        Err(crate::error::StoreError::unsupported("commit_transaction"))
    }
}
