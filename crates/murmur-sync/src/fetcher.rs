//! Batch fetcher: pulls records from a store in bounded pages.
//!
//! The sequence is lazy and finite. It is restartable only from the
//! beginning of the filtered set; re-processing is made safe by the
//! reconciler's idempotency, not by fetch checkpoints.

use async_trait::async_trait;
use murmur_store::{
    Page, PageRequest, PrimaryStore, StoreResult, Submission, SubmissionFilter, WorkflowDocument,
    WorkflowStore,
};

/// A store that can be read page by page.
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;

    /// Fetch one page of records matching `filter`, newest first.
    async fn fetch_page(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Self::Item>>;

    /// Count records matching `filter`.
    async fn count(&self, filter: &SubmissionFilter) -> StoreResult<u64>;
}

#[async_trait]
impl PagedSource for dyn PrimaryStore {
    type Item = Submission;

    async fn fetch_page(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Submission>> {
        self.list_submissions(filter, page).await
    }

    async fn count(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        self.count_submissions(filter).await
    }
}

#[async_trait]
impl PagedSource for dyn WorkflowStore {
    type Item = WorkflowDocument;

    async fn fetch_page(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<WorkflowDocument>> {
        self.list_documents(filter, page).await
    }

    async fn count(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        self.count_documents(filter).await
    }
}

/// Cursor over the batches of a filtered record set.
pub struct BatchFetcher<'a, S: PagedSource + ?Sized> {
    source: &'a S,
    filter: SubmissionFilter,
    page_size: u32,
    next_page: PageRequest,
    exhausted: bool,
    batches_fetched: usize,
}

impl<'a, S: PagedSource + ?Sized> BatchFetcher<'a, S> {
    /// Create a fetcher. `page_size` is clamped to at least 1.
    pub fn new(source: &'a S, filter: SubmissionFilter, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            source,
            filter,
            page_size,
            next_page: PageRequest::first(page_size),
            exhausted: false,
            batches_fetched: 0,
        }
    }

    /// Fetch the next batch, or `None` once the set is exhausted.
    ///
    /// Never returns an empty batch.
    pub async fn next_batch(&mut self) -> StoreResult<Option<Vec<S::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.source.fetch_page(&self.filter, self.next_page).await?;
        if page.items.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.exhausted = !page.has_more;
        self.next_page = self.next_page.next();
        self.batches_fetched += 1;
        Ok(Some(page.items))
    }

    /// Start over from the first page.
    pub fn restart(&mut self) {
        self.next_page = PageRequest::first(self.page_size);
        self.exhausted = false;
        self.batches_fetched = 0;
    }

    /// Number of records in the filtered set and the batches they span.
    pub async fn totals(&self) -> StoreResult<(u64, u64)> {
        let records = self.source.count(&self.filter).await?;
        Ok((records, records.div_ceil(u64::from(self.page_size))))
    }

    /// Number of batches returned since creation or the last restart.
    #[must_use]
    pub fn batches_fetched(&self) -> usize {
        self.batches_fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use murmur_store::memory::InMemoryPrimaryStore;
    use murmur_store::SubmissionStatus;
    use std::sync::Arc;

    fn store(count: usize) -> Arc<dyn PrimaryStore> {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let submissions = (0..count).map(|i| {
            let mut s = Submission::new(
                format!("s{i:03}"),
                "river",
                "hello",
                base + Duration::minutes(i as i64),
            );
            if i % 4 == 0 {
                s.status = SubmissionStatus::Rejected;
            }
            s
        });
        Arc::new(InMemoryPrimaryStore::with_submissions(submissions))
    }

    async fn drain<S: PagedSource + ?Sized>(fetcher: &mut BatchFetcher<'_, S>) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Some(batch) = fetcher.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_batches_are_bounded_by_page_size() {
        let store = store(12);
        let mut fetcher = BatchFetcher::new(store.as_ref(), SubmissionFilter::all(), 5);
        assert_eq!(drain(&mut fetcher).await, vec![5, 5, 2]);
        assert_eq!(fetcher.batches_fetched(), 3);
        assert!(fetcher.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filter_applied_by_store() {
        let store = store(12);
        let mut fetcher = BatchFetcher::new(store.as_ref(), SubmissionFilter::live(false), 50);
        let batch = fetcher.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 9);
        assert!(batch.iter().all(|s| s.status != SubmissionStatus::Rejected));
        assert_eq!(fetcher.totals().await.unwrap(), (9, 1));
    }

    #[tokio::test]
    async fn test_batches_are_newest_first() {
        let store = store(6);
        let mut fetcher = BatchFetcher::new(store.as_ref(), SubmissionFilter::all(), 4);
        let first = fetcher.next_batch().await.unwrap().unwrap();
        assert_eq!(first[0].id.as_str(), "s005");
        assert!(first.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_restart_begins_again() {
        let store = store(7);
        let mut fetcher = BatchFetcher::new(store.as_ref(), SubmissionFilter::all(), 3);
        assert_eq!(drain(&mut fetcher).await, vec![3, 3, 1]);
        fetcher.restart();
        assert_eq!(drain(&mut fetcher).await, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_empty_set_yields_no_batches() {
        let store = store(0);
        let mut fetcher = BatchFetcher::new(store.as_ref(), SubmissionFilter::all(), 10);
        assert!(fetcher.next_batch().await.unwrap().is_none());
        assert_eq!(fetcher.totals().await.unwrap(), (0, 0));
    }
}
