//! In-memory store backends.
//!
//! Used for tests and local dry runs. Each instance is fully isolated and
//! supports failure injection so callers can exercise partial-failure paths
//! without a network.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::model::{PrimaryUpdate, Submission, SubmissionId, WorkflowDocument};
use crate::query::{Page, PageRequest, SubmissionFilter};
use crate::traits::{PrimaryStore, WorkflowStore};

/// Slice an ordered result into a page.
fn paginate<T: Clone>(ordered: &[T], page: PageRequest) -> Page<T> {
    let start = usize::try_from(page.offset).unwrap_or(usize::MAX).min(ordered.len());
    let end = start.saturating_add(page.limit as usize).min(ordered.len());
    Page::new(ordered[start..end].to_vec(), end < ordered.len())
}

/// In-memory primary store.
#[derive(Default)]
pub struct InMemoryPrimaryStore {
    records: RwLock<BTreeMap<SubmissionId, Submission>>,
    deleted: RwLock<HashSet<SubmissionId>>,
    rejected_writes: RwLock<HashSet<SubmissionId>>,
    fail_listing: AtomicBool,
    update_calls: AtomicUsize,
}

impl InMemoryPrimaryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with submissions.
    pub fn with_submissions(submissions: impl IntoIterator<Item = Submission>) -> Self {
        let records = submissions
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect::<BTreeMap<_, _>>();
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Insert or overwrite a submission.
    pub async fn insert(&self, submission: Submission) {
        self.records
            .write()
            .await
            .insert(submission.id.clone(), submission);
    }

    /// Soft-delete a submission: it stays stored but is hidden from queries.
    pub async fn soft_delete(&self, id: &SubmissionId) {
        self.deleted.write().await.insert(id.clone());
    }

    /// Hard-remove a submission, simulating deletion outside the engine.
    pub async fn remove(&self, id: &SubmissionId) {
        self.records.write().await.remove(id);
    }

    /// Snapshot a submission regardless of soft-deletion.
    pub async fn snapshot(&self, id: &SubmissionId) -> Option<Submission> {
        self.records.read().await.get(id).cloned()
    }

    /// Reject every update to this id with a validation error.
    pub async fn reject_writes_for(&self, id: impl Into<SubmissionId>) {
        self.rejected_writes.write().await.insert(id.into());
    }

    /// Make listing and counting fail as if the store were unreachable.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of update calls received, successful or not.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn check_listing(&self) -> StoreResult<()> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::connection_failed("primary store unreachable"));
        }
        Ok(())
    }

    async fn visible(&self, filter: &SubmissionFilter) -> Vec<Submission> {
        let records = self.records.read().await;
        let deleted = self.deleted.read().await;
        let mut visible: Vec<Submission> = records
            .values()
            .filter(|s| !deleted.contains(&s.id) && filter.matches(s.status))
            .cloned()
            .collect();
        visible.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        visible
    }
}

#[async_trait]
impl PrimaryStore for InMemoryPrimaryStore {
    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Submission>> {
        self.check_listing()?;
        Ok(paginate(&self.visible(filter).await, page))
    }

    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        self.check_listing()?;
        Ok(self.visible(filter).await.len() as u64)
    }

    async fn get_submission(&self, id: &SubmissionId) -> StoreResult<Option<Submission>> {
        if self.deleted.read().await.contains(id) {
            return Ok(None);
        }
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update_submission(
        &self,
        id: &SubmissionId,
        update: &PrimaryUpdate,
    ) -> StoreResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected_writes.read().await.contains(id) {
            return Err(StoreError::rejected(format!("update rejected for {id}")));
        }
        if self.deleted.read().await.contains(id) {
            return Err(StoreError::not_found(id.as_str()));
        }
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(submission) => {
                submission.apply_update(update);
                Ok(())
            }
            None => Err(StoreError::not_found(id.as_str())),
        }
    }
}

/// In-memory workflow store.
pub struct InMemoryWorkflowStore {
    documents: RwLock<BTreeMap<SubmissionId, WorkflowDocument>>,
    rejected_writes: RwLock<HashSet<SubmissionId>>,
    transactions: AtomicBool,
    fail_listing: AtomicBool,
    fail_lookups: AtomicBool,
    write_calls: AtomicUsize,
    transaction_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            rejected_writes: RwLock::new(HashSet::new()),
            transactions: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            write_calls: AtomicUsize::new(0),
            transaction_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }
}

impl InMemoryWorkflowStore {
    /// Create an empty store without transaction support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with documents.
    pub fn with_documents(documents: impl IntoIterator<Item = WorkflowDocument>) -> Self {
        let documents = documents
            .into_iter()
            .map(|d| (d.submission_id.clone(), d))
            .collect::<BTreeMap<_, _>>();
        Self {
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    /// Enable or disable atomic batch commits.
    #[must_use]
    pub fn with_transactions(self, enabled: bool) -> Self {
        self.transactions.store(enabled, Ordering::SeqCst);
        self
    }

    /// Insert or overwrite a document directly, as a moderator edit would.
    pub async fn insert(&self, document: WorkflowDocument) {
        self.documents
            .write()
            .await
            .insert(document.submission_id.clone(), document);
    }

    /// Snapshot a document.
    pub async fn snapshot(&self, id: &SubmissionId) -> Option<WorkflowDocument> {
        self.documents.read().await.get(id).cloned()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Reject every write of this id with a validation error.
    pub async fn reject_writes_for(&self, id: impl Into<SubmissionId>) {
        self.rejected_writes.write().await.insert(id.into());
    }

    /// Make listing and counting fail as if the store were unreachable.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make document lookups time out.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Number of single-document writes received.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Number of transactions received.
    pub fn transaction_calls(&self) -> usize {
        self.transaction_calls.load(Ordering::SeqCst)
    }

    /// Number of batch lookups received.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    fn check_listing(&self) -> StoreResult<()> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::connection_failed("workflow store unreachable"));
        }
        Ok(())
    }

    fn check_lookup(&self) -> StoreResult<()> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::timeout("workflow lookup timed out"));
        }
        Ok(())
    }

    async fn check_write(&self, document: &WorkflowDocument) -> StoreResult<()> {
        if self
            .rejected_writes
            .read()
            .await
            .contains(&document.submission_id)
        {
            return Err(StoreError::rejected(format!(
                "document rejected for {}",
                document.submission_id
            )));
        }
        Ok(())
    }

    async fn visible(&self, filter: &SubmissionFilter) -> Vec<WorkflowDocument> {
        let mut visible: Vec<WorkflowDocument> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| filter.matches(d.status))
            .cloned()
            .collect();
        visible.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.submission_id.cmp(&a.submission_id))
        });
        visible
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn list_documents(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<WorkflowDocument>> {
        self.check_listing()?;
        Ok(paginate(&self.visible(filter).await, page))
    }

    async fn count_documents(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        self.check_listing()?;
        Ok(self.visible(filter).await.len() as u64)
    }

    async fn find_document(&self, id: &SubmissionId) -> StoreResult<Option<WorkflowDocument>> {
        self.check_lookup()?;
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn find_documents(&self, ids: &[SubmissionId]) -> StoreResult<Vec<WorkflowDocument>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.check_lookup()?;
        let documents = self.documents.read().await;
        Ok(ids.iter().filter_map(|id| documents.get(id).cloned()).collect())
    }

    async fn create_or_replace(&self, document: &WorkflowDocument) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write(document).await?;
        self.documents
            .write()
            .await
            .insert(document.submission_id.clone(), document.clone());
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        self.transactions.load(Ordering::SeqCst)
    }

    async fn commit_transaction(&self, documents: &[WorkflowDocument]) -> StoreResult<()> {
        if !self.supports_transactions() {
            return Err(StoreError::unsupported("commit_transaction"));
        }
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        for document in documents {
            self.check_write(document).await?;
        }
        let mut stored = self.documents.write().await;
        for document in documents {
            stored.insert(document.submission_id.clone(), document.clone());
        }
        Ok(())
    }
}
