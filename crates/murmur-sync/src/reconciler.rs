//! Reconciler: the unit of idempotent work.
//!
//! One call per record decides whether to create, update or skip the
//! counterpart in the target store and performs the write. Every store
//! error is caught here and converted into a [`ReconcileOutcome`]; nothing
//! propagates to the batch.

use std::collections::HashMap;
use std::sync::Arc;

use murmur_store::{
    PrimaryStore, StoreError, Submission, SubmissionId, WorkflowDocument, WorkflowStore,
};
use tracing::{debug, instrument, warn};

use crate::adapter::RecordAdapter;
use crate::error::FailureReason;
use crate::types::{Direction, ReconcileOutcome, RecordAction, SkipReason};

/// A record fetched from one store, to be reconciled into the other.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncRecord {
    /// Primary submission, reconciled into the workflow store.
    Primary(Submission),
    /// Workflow document, reconciled into the primary store.
    Workflow(WorkflowDocument),
}

/// Write planned for the workflow store.
#[derive(Debug)]
enum DocumentPlan {
    Unchanged,
    Write {
        document: WorkflowDocument,
        create: bool,
    },
}

impl DocumentPlan {
    fn for_submission(submission: &Submission, existing: Option<&WorkflowDocument>) -> Self {
        let merged = RecordAdapter::to_workflow_document(submission, existing);
        match existing {
            Some(current) if *current == merged => Self::Unchanged,
            Some(_) => Self::Write {
                document: merged,
                create: false,
            },
            None => Self::Write {
                document: merged,
                create: true,
            },
        }
    }
}

fn write_action(create: bool, dry_run: bool) -> RecordAction {
    match (create, dry_run) {
        (true, false) => RecordAction::Created,
        (false, false) => RecordAction::Updated,
        (true, true) => RecordAction::WouldCreate,
        (false, true) => RecordAction::WouldUpdate,
    }
}

/// Reconciles single records and batches between the two stores.
pub struct Reconciler {
    primary: Arc<dyn PrimaryStore>,
    workflow: Arc<dyn WorkflowStore>,
    dry_run: bool,
}

impl Reconciler {
    /// Create a reconciler that writes to the target store.
    pub fn new(primary: Arc<dyn PrimaryStore>, workflow: Arc<dyn WorkflowStore>) -> Self {
        Self {
            primary,
            workflow,
            dry_run: false,
        }
    }

    /// Plan and count outcomes without writing.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reconcile one record in its direction.
    pub async fn reconcile(&self, record: &SyncRecord) -> ReconcileOutcome {
        match record {
            SyncRecord::Primary(submission) => self.reconcile_submission(submission).await,
            SyncRecord::Workflow(document) => self.reconcile_document(document).await,
        }
    }

    /// Primary→workflow: read the current document, merge, upsert.
    #[instrument(skip(self, submission), fields(submission_id = %submission.id))]
    pub async fn reconcile_submission(&self, submission: &Submission) -> ReconcileOutcome {
        let direction = Direction::PrimaryToWorkflow;
        if !submission.id.is_valid() {
            return malformed(direction);
        }

        let existing = match self.workflow.find_document(&submission.id).await {
            Ok(existing) => existing,
            Err(e) => return failure(direction, &submission.id, &e),
        };

        match DocumentPlan::for_submission(submission, existing.as_ref()) {
            DocumentPlan::Unchanged => ReconcileOutcome::applied(RecordAction::Unchanged),
            DocumentPlan::Write { create, .. } if self.dry_run => {
                ReconcileOutcome::applied(write_action(create, true))
            }
            DocumentPlan::Write { document, create } => {
                self.write_document(&document, create).await
            }
        }
    }

    /// Primary→workflow for a whole batch.
    ///
    /// Existing documents are looked up with one call. Changed documents
    /// are committed in one transaction when the store supports it; if the
    /// transaction fails each record is written individually so one bad
    /// record cannot fail its neighbours. Outcomes are in input order.
    #[instrument(skip(self, batch), fields(records = batch.len()))]
    pub async fn reconcile_submission_batch(&self, batch: &[Submission]) -> Vec<ReconcileOutcome> {
        let direction = Direction::PrimaryToWorkflow;
        let mut outcomes: Vec<Option<ReconcileOutcome>> = vec![None; batch.len()];

        let mut ids = Vec::with_capacity(batch.len());
        for (slot, submission) in outcomes.iter_mut().zip(batch) {
            if submission.id.is_valid() {
                ids.push(submission.id.clone());
            } else {
                *slot = Some(malformed(direction));
            }
        }

        let mut existing: HashMap<SubmissionId, WorkflowDocument> =
            match self.workflow.find_documents(&ids).await {
                Ok(documents) => documents
                    .into_iter()
                    .map(|d| (d.submission_id.clone(), d))
                    .collect(),
                Err(e) => {
                    warn!(
                        error_code = e.error_code(),
                        error = %e,
                        "Batch lookup failed, reconciling records individually"
                    );
                    for (slot, submission) in outcomes.iter_mut().zip(batch) {
                        if slot.is_none() {
                            *slot = Some(self.reconcile_submission(submission).await);
                        }
                    }
                    return outcomes.into_iter().flatten().collect();
                }
            };

        let mut pending: Vec<(usize, bool)> = Vec::new();
        let mut documents: Vec<WorkflowDocument> = Vec::new();
        for (index, submission) in batch.iter().enumerate() {
            if outcomes[index].is_some() {
                continue;
            }
            let current = existing.remove(&submission.id);
            match DocumentPlan::for_submission(submission, current.as_ref()) {
                DocumentPlan::Unchanged => {
                    outcomes[index] = Some(ReconcileOutcome::applied(RecordAction::Unchanged));
                }
                DocumentPlan::Write { create, .. } if self.dry_run => {
                    outcomes[index] = Some(ReconcileOutcome::applied(write_action(create, true)));
                }
                DocumentPlan::Write { document, create } => {
                    pending.push((index, create));
                    documents.push(document);
                }
            }
        }

        if documents.len() > 1 && self.workflow.supports_transactions() {
            match self.workflow.commit_transaction(&documents).await {
                Ok(()) => {
                    debug!(documents = documents.len(), "Committed batch transaction");
                    for (index, create) in pending.drain(..) {
                        outcomes[index] =
                            Some(ReconcileOutcome::applied(write_action(create, false)));
                    }
                    documents.clear();
                }
                Err(e) => {
                    warn!(
                        error_code = e.error_code(),
                        error = %e,
                        documents = documents.len(),
                        "Batch transaction failed, writing records individually"
                    );
                }
            }
        }

        for ((index, create), document) in pending.into_iter().zip(documents) {
            outcomes[index] = Some(self.write_document(&document, create).await);
        }

        outcomes.into_iter().flatten().collect()
    }

    /// Workflow→primary: apply workflow-owned fields to an existing submission.
    ///
    /// Documents whose submission is missing from the primary store are
    /// skipped as orphans; no submission is ever created here.
    #[instrument(skip(self, document), fields(submission_id = %document.submission_id))]
    pub async fn reconcile_document(&self, document: &WorkflowDocument) -> ReconcileOutcome {
        let direction = Direction::WorkflowToPrimary;
        let id = &document.submission_id;
        if !id.is_valid() {
            return malformed(direction);
        }

        let existing = match self.primary.get_submission(id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => return orphan(id),
            Err(e) => return failure(direction, id, &e),
        };

        let update = RecordAdapter::to_primary_update(document, &existing);
        if update == existing.workflow_fields() {
            return ReconcileOutcome::applied(RecordAction::Unchanged);
        }
        if self.dry_run {
            return ReconcileOutcome::applied(RecordAction::WouldUpdate);
        }

        match self.primary.update_submission(id, &update).await {
            Ok(()) => ReconcileOutcome::applied(RecordAction::Updated),
            // Deleted between the read and the write.
            Err(StoreError::NotFound { .. }) => orphan(id),
            Err(e) => failure(direction, id, &e),
        }
    }

    async fn write_document(&self, document: &WorkflowDocument, create: bool) -> ReconcileOutcome {
        match self.workflow.create_or_replace(document).await {
            Ok(()) => ReconcileOutcome::applied(write_action(create, false)),
            Err(e) => failure(Direction::PrimaryToWorkflow, &document.submission_id, &e),
        }
    }
}

fn failure(direction: Direction, id: &SubmissionId, error: &StoreError) -> ReconcileOutcome {
    let reason = FailureReason::from(error);
    warn!(
        submission_id = %id,
        direction = %direction,
        error_code = %reason.code,
        kind = %reason.kind,
        error = %error,
        "Record failed to reconcile"
    );
    ReconcileOutcome::failed(reason)
}

fn malformed(direction: Direction) -> ReconcileOutcome {
    warn!(direction = %direction, "Record has no submission id");
    ReconcileOutcome::failed(FailureReason::malformed("record has no submissionId"))
}

fn orphan(id: &SubmissionId) -> ReconcileOutcome {
    warn!(
        submission_id = %id,
        direction = %Direction::WorkflowToPrimary,
        "Skipping orphaned workflow document"
    );
    ReconcileOutcome::skipped(SkipReason::Orphaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use chrono::{Duration, TimeZone, Utc};
    use murmur_store::memory::{InMemoryPrimaryStore, InMemoryWorkflowStore};
    use murmur_store::SubmissionStatus;

    fn submission(id: &str) -> Submission {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut s = Submission::new(id, "river", format!("content {id}"), base);
        s.created_at = base + Duration::seconds(id.len() as i64);
        s.color = "teal".into();
        s
    }

    fn stores(
        submissions: Vec<Submission>,
        documents: Vec<WorkflowDocument>,
    ) -> (Arc<InMemoryPrimaryStore>, Arc<InMemoryWorkflowStore>) {
        (
            Arc::new(InMemoryPrimaryStore::with_submissions(submissions)),
            Arc::new(InMemoryWorkflowStore::with_documents(documents)),
        )
    }

    fn reconciler(
        primary: &Arc<InMemoryPrimaryStore>,
        workflow: &Arc<InMemoryWorkflowStore>,
    ) -> Reconciler {
        Reconciler::new(primary.clone(), workflow.clone())
    }

    #[tokio::test]
    async fn test_reconcile_submission_creates_then_is_idempotent() {
        let (primary, workflow) = stores(vec![submission("s1")], vec![]);
        let reconciler = reconciler(&primary, &workflow);
        let record = SyncRecord::Primary(submission("s1"));

        let first = reconciler.reconcile(&record).await;
        assert_eq!(first, ReconcileOutcome::applied(RecordAction::Created));
        let after_first = workflow.snapshot(&SubmissionId::new("s1")).await;

        let second = reconciler.reconcile(&record).await;
        assert_eq!(second, ReconcileOutcome::applied(RecordAction::Unchanged));
        assert_eq!(workflow.snapshot(&SubmissionId::new("s1")).await, after_first);
        assert_eq!(workflow.len().await, 1);
        assert_eq!(workflow.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_submission_updates_primary_owned_fields() {
        let mut doc = RecordAdapter::to_workflow_document(&submission("s1"), None);
        doc.status = SubmissionStatus::Approved;
        let (primary, workflow) = stores(vec![], vec![doc]);
        let reconciler = reconciler(&primary, &workflow);

        let mut edited = submission("s1");
        edited.content = "edited".into();
        let outcome = reconciler.reconcile_submission(&edited).await;
        assert_eq!(outcome, ReconcileOutcome::applied(RecordAction::Updated));

        let stored = workflow.snapshot(&edited.id).await.unwrap();
        assert_eq!(stored.content, "edited");
        assert_eq!(stored.status, SubmissionStatus::Approved);
    }

    #[tokio::test]
    async fn test_reconcile_submission_lookup_failure_is_counted_not_raised() {
        let (primary, workflow) = stores(vec![], vec![]);
        workflow.set_fail_lookups(true);
        let outcome = reconciler(&primary, &workflow)
            .reconcile_submission(&submission("s1"))
            .await;
        match outcome {
            ReconcileOutcome::Failed { reason } => assert_eq!(reason.kind, FailureKind::Transient),
            other => panic!("Expected Failed, got: {other:?}"),
        }
        assert_eq!(workflow.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_record_fails_before_any_io() {
        let (primary, workflow) = stores(vec![], vec![]);
        let reconciler = reconciler(&primary, &workflow);

        let outcome = reconciler.reconcile_submission(&submission("")).await;
        match outcome {
            ReconcileOutcome::Failed { reason } => assert_eq!(reason.kind, FailureKind::Malformed),
            other => panic!("Expected Failed, got: {other:?}"),
        }

        let mut doc = RecordAdapter::to_workflow_document(&submission("x"), None);
        doc.submission_id = SubmissionId::new("  ");
        assert!(reconciler.reconcile_document(&doc).await.is_failed());
        assert_eq!(primary.update_calls(), 0);
        assert_eq!(workflow.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_writing() {
        let (primary, workflow) = stores(vec![submission("s1")], vec![]);
        let reconciler = reconciler(&primary, &workflow).with_dry_run(true);

        let outcome = reconciler.reconcile_submission(&submission("s1")).await;
        assert_eq!(outcome, ReconcileOutcome::applied(RecordAction::WouldCreate));
        assert!(workflow.is_empty().await);

        let mut doc = RecordAdapter::to_workflow_document(&submission("s1"), None);
        doc.status = SubmissionStatus::Rejected;
        let outcome = reconciler.reconcile_document(&doc).await;
        assert_eq!(outcome, ReconcileOutcome::applied(RecordAction::WouldUpdate));
        assert_eq!(primary.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_document_orphan_is_skipped_without_write() {
        let (primary, workflow) = stores(vec![], vec![]);
        let doc = RecordAdapter::to_workflow_document(&submission("gone"), None);

        let outcome = reconciler(&primary, &workflow)
            .reconcile(&SyncRecord::Workflow(doc))
            .await;
        assert_eq!(outcome, ReconcileOutcome::skipped(SkipReason::Orphaned));
        assert_eq!(primary.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_document_writes_back_decision_once() {
        let (primary, workflow) = stores(vec![submission("s1")], vec![]);
        let reconciler = reconciler(&primary, &workflow);
        let approved_at = Utc.with_ymd_and_hms(2026, 5, 3, 8, 30, 0).unwrap();
        let mut doc = RecordAdapter::to_workflow_document(&submission("s1"), None);
        doc.status = SubmissionStatus::Approved;
        doc.approved_at = Some(approved_at);
        doc.content = "stale".into();

        assert_eq!(
            reconciler.reconcile_document(&doc).await,
            ReconcileOutcome::applied(RecordAction::Updated)
        );
        assert_eq!(
            reconciler.reconcile_document(&doc).await,
            ReconcileOutcome::applied(RecordAction::Unchanged)
        );
        assert_eq!(primary.update_calls(), 1);

        let stored = primary.snapshot(&SubmissionId::new("s1")).await.unwrap();
        assert_eq!(stored.status, SubmissionStatus::Approved);
        assert_eq!(stored.approved_at, Some(approved_at));
        assert_eq!(stored.content, "content s1");
    }

    #[tokio::test]
    async fn test_batch_uses_single_lookup_and_transaction() {
        let submissions: Vec<_> = ["a", "b", "c"].into_iter().map(submission).collect();
        let primary = Arc::new(InMemoryPrimaryStore::with_submissions(submissions.clone()));
        let workflow = Arc::new(InMemoryWorkflowStore::new().with_transactions(true));
        let reconciler = Reconciler::new(primary, workflow.clone());

        let outcomes = reconciler.reconcile_submission_batch(&submissions).await;
        assert!(outcomes
            .iter()
            .all(|o| *o == ReconcileOutcome::applied(RecordAction::Created)));
        assert_eq!(workflow.lookup_calls(), 1);
        assert_eq!(workflow.transaction_calls(), 1);
        assert_eq!(workflow.write_calls(), 0);
        assert_eq!(workflow.len().await, 3);
    }

    #[tokio::test]
    async fn test_batch_transaction_failure_falls_back_per_record() {
        let submissions: Vec<_> = ["a", "b", "c", "d"].into_iter().map(submission).collect();
        let primary = Arc::new(InMemoryPrimaryStore::with_submissions(submissions.clone()));
        let workflow = Arc::new(InMemoryWorkflowStore::new().with_transactions(true));
        workflow.reject_writes_for("c").await;
        let reconciler = Reconciler::new(primary, workflow.clone());

        let outcomes = reconciler.reconcile_submission_batch(&submissions).await;
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[2].is_failed());
        assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 3);
        assert_eq!(workflow.transaction_calls(), 1);
        assert_eq!(workflow.write_calls(), 4);
        assert_eq!(workflow.len().await, 3);
    }

    #[tokio::test]
    async fn test_batch_lookup_failure_reconciles_individually() {
        let submissions: Vec<_> = ["a", "b"].into_iter().map(submission).collect();
        let (primary, workflow) = stores(submissions.clone(), vec![]);
        workflow.set_fail_lookups(true);

        let outcomes = reconciler(&primary, &workflow)
            .reconcile_submission_batch(&submissions)
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(ReconcileOutcome::is_failed));
    }

    #[tokio::test]
    async fn test_batch_mixed_outcomes_keep_input_order() {
        let existing = RecordAdapter::to_workflow_document(&submission("same"), None);
        let batch = vec![submission("new"), submission(""), submission("same")];
        let (primary, workflow) = stores(vec![], vec![existing]);

        let outcomes = reconciler(&primary, &workflow)
            .reconcile_submission_batch(&batch)
            .await;
        assert_eq!(outcomes[0], ReconcileOutcome::applied(RecordAction::Created));
        assert!(outcomes[1].is_failed());
        assert_eq!(outcomes[2], ReconcileOutcome::applied(RecordAction::Unchanged));
    }
}
