//! PostgreSQL primary store.
//!
//! Reads the `submissions` table and writes back only the workflow-owned
//! columns. Expected schema:
//!
//! ```sql
//! CREATE TABLE submissions (
//!     id                TEXT PRIMARY KEY,
//!     username          TEXT NOT NULL,
//!     content           TEXT NOT NULL,
//!     content_sanitized TEXT NOT NULL,
//!     audio_url         TEXT,
//!     status            TEXT NOT NULL DEFAULT 'pending',
//!     moderator_notes   TEXT,
//!     created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     approved_at       TIMESTAMPTZ,
//!     show_on_homepage  BOOLEAN,
//!     tags              TEXT[] NOT NULL DEFAULT '{}',
//!     color             TEXT NOT NULL DEFAULT '',
//!     risk_flagged      BOOLEAN NOT NULL DEFAULT FALSE,
//!     sentiment         TEXT,
//!     deleted_at        TIMESTAMPTZ
//! );
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::model::{PrimaryUpdate, RiskFlags, Submission, SubmissionId, SubmissionStatus};
use crate::query::{Page, PageRequest, SubmissionFilter};
use crate::retry::RetryPolicy;
use crate::traits::PrimaryStore;

const SUBMISSION_COLUMNS: &str = "id, username, content, content_sanitized, audio_url, status, \
     moderator_notes, created_at, approved_at, show_on_homepage, tags, color, risk_flagged, sentiment";

/// Shared `WHERE` clause. `$1` = include rejected, `$2` = status or NULL.
const FILTER_CLAUSE: &str = "deleted_at IS NULL \
     AND ($1 OR status <> 'rejected') \
     AND ($2::TEXT IS NULL OR status = $2)";

/// Connection settings for [`PgPrimaryStore::connect`].
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Per-call timeout. Bounds connection acquisition and each query.
    pub timeout: Duration,
}

/// Primary store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgPrimaryStore {
    pool: PgPool,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl PgPrimaryStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            pool,
            retry,
            call_timeout,
        }
    }

    /// Open a pool lazily; no connection is made until the first query.
    pub fn connect(config: &PgStoreConfig, retry: RetryPolicy) -> StoreResult<Self> {
        if config.database_url.is_empty() {
            return Err(StoreError::invalid_configuration("database url is empty"));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.timeout)
            .connect_lazy(&config.database_url)?;
        Ok(Self::new(pool, retry, config.timeout))
    }
}

#[async_trait]
impl PrimaryStore for PgPrimaryStore {
    #[instrument(skip(self))]
    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        // Fetch one extra row to learn whether another page follows.
        let limit = i64::from(page.limit) + 1;
        let offset = i64::try_from(page.offset)
            .map_err(|_| StoreError::rejected("page offset out of range"))?;

        let (sql, pool, limit_per_call) = (sql.as_str(), &self.pool, self.call_timeout);
        let rows: Vec<SubmissionRow> = self
            .retry
            .execute("list_submissions", || async move {
                bounded(
                    limit_per_call,
                    sqlx::query_as::<_, SubmissionRow>(sql)
                        .bind(filter.include_rejected)
                        .bind(filter.status.map(|s| s.as_str()))
                        .bind(limit)
                        .bind(offset)
                        .fetch_all(pool),
                )
                .await
            })
            .await?;

        let has_more = rows.len() > page.limit as usize;
        let items = rows
            .into_iter()
            .take(page.limit as usize)
            .map(SubmissionRow::into_submission)
            .collect();
        Ok(Page::new(items, has_more))
    }

    #[instrument(skip(self))]
    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM submissions WHERE {FILTER_CLAUSE}");
        let (sql, pool, limit_per_call) = (sql.as_str(), &self.pool, self.call_timeout);
        let count: i64 = self
            .retry
            .execute("count_submissions", || async move {
                bounded(
                    limit_per_call,
                    sqlx::query_scalar::<_, i64>(sql)
                        .bind(filter.include_rejected)
                        .bind(filter.status.map(|s| s.as_str()))
                        .fetch_one(pool),
                )
                .await
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self), fields(submission_id = %id))]
    async fn get_submission(&self, id: &SubmissionId) -> StoreResult<Option<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1 AND deleted_at IS NULL"
        );
        let (sql, pool, limit_per_call) = (sql.as_str(), &self.pool, self.call_timeout);
        let row: Option<SubmissionRow> = self
            .retry
            .execute("get_submission", || async move {
                bounded(
                    limit_per_call,
                    sqlx::query_as::<_, SubmissionRow>(sql)
                        .bind(id.as_str())
                        .fetch_optional(pool),
                )
                .await
            })
            .await?;
        Ok(row.map(SubmissionRow::into_submission))
    }

    #[instrument(skip(self, update), fields(submission_id = %id))]
    async fn update_submission(
        &self,
        id: &SubmissionId,
        update: &PrimaryUpdate,
    ) -> StoreResult<()> {
        let (pool, limit_per_call) = (&self.pool, self.call_timeout);
        let result = self
            .retry
            .execute("update_submission", || async move {
                let query = sqlx::query(
                    r"
                    UPDATE submissions
                    SET status = $2,
                        moderator_notes = $3,
                        approved_at = $4,
                        show_on_homepage = $5,
                        tags = $6
                    WHERE id = $1 AND deleted_at IS NULL
                    ",
                )
                .bind(id.as_str())
                .bind(update.status.as_str())
                .bind(update.moderator_notes.as_deref())
                .bind(update.approved_at)
                .bind(update.show_on_homepage)
                .bind(&update.tags);
                bounded(limit_per_call, query.execute(pool)).await
            })
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(id.as_str()));
        }
        Ok(())
    }
}

/// Run one query under the per-call timeout. An elapsed timer becomes a
/// transient `Timeout`.
async fn bounded<T, F>(limit: Duration, query: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    Ok(tokio::time::timeout(limit, query).await??)
}

/// Row from the `submissions` table.
#[derive(Debug, sqlx::FromRow)]
struct SubmissionRow {
    id: String,
    username: String,
    content: String,
    content_sanitized: String,
    audio_url: Option<String>,
    status: String,
    moderator_notes: Option<String>,
    created_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    show_on_homepage: Option<bool>,
    tags: Vec<String>,
    color: String,
    risk_flagged: bool,
    sentiment: Option<String>,
}

impl SubmissionRow {
    fn into_submission(self) -> Submission {
        let status = self.status.parse().unwrap_or_else(|_| {
            warn!(
                submission_id = %self.id,
                status = %self.status,
                "Unknown submission status in primary store, treating as pending"
            );
            SubmissionStatus::Pending
        });

        Submission {
            id: SubmissionId::new(self.id),
            username: self.username,
            content: self.content,
            content_sanitized: self.content_sanitized,
            audio_url: self.audio_url,
            created_at: self.created_at,
            risk: RiskFlags {
                flagged: self.risk_flagged,
                sentiment: self.sentiment,
            },
            color: self.color,
            status,
            moderator_notes: self.moderator_notes,
            approved_at: self.approved_at,
            show_on_homepage: self.show_on_homepage,
            tags: self.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> SubmissionRow {
        SubmissionRow {
            id: "s1".into(),
            username: "river".into(),
            content: "hello".into(),
            content_sanitized: "hello".into(),
            audio_url: Some("https://cdn.example/s1.mp3".into()),
            status: status.into(),
            moderator_notes: None,
            created_at: Utc::now(),
            approved_at: None,
            show_on_homepage: None,
            tags: vec!["night".into()],
            color: "teal".into(),
            risk_flagged: true,
            sentiment: Some("calm".into()),
        }
    }

    #[test]
    fn test_row_into_submission() {
        let submission = row("approved").into_submission();
        assert_eq!(submission.id.as_str(), "s1");
        assert_eq!(submission.status, SubmissionStatus::Approved);
        assert!(submission.risk.flagged);
        assert_eq!(submission.risk.sentiment.as_deref(), Some("calm"));
        assert_eq!(submission.tags, vec!["night".to_string()]);
    }

    #[test]
    fn test_unknown_status_falls_back_to_pending() {
        let submission = row("archived").into_submission();
        assert_eq!(submission.status, SubmissionStatus::Pending);
    }

    #[test]
    fn test_connect_rejects_empty_url() {
        let config = PgStoreConfig {
            database_url: String::new(),
            max_connections: 1,
            timeout: Duration::from_secs(1),
        };
        let err = PgPrimaryStore::connect(&config, RetryPolicy::none()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[tokio::test]
    async fn test_hung_query_times_out_as_transient() {
        let err = bounded(
            Duration::from_millis(5),
            std::future::pending::<Result<(), sqlx::Error>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_completed_query_error_passes_through() {
        let err = bounded(Duration::from_secs(1), async {
            Err::<(), _>(sqlx::Error::RowNotFound)
        })
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    /// Requires a live database: `DATABASE_URL=postgres://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_round_trip_against_live_database() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let store = PgPrimaryStore::connect(
            &PgStoreConfig {
                database_url: url,
                max_connections: 2,
                timeout: Duration::from_secs(5),
            },
            RetryPolicy::default(),
        )
        .unwrap();

        let count = store
            .count_submissions(&SubmissionFilter::all())
            .await
            .unwrap();
        let page = store
            .list_submissions(&SubmissionFilter::all(), PageRequest::first(10))
            .await
            .unwrap();
        assert!(page.items.len() as u64 <= count);
    }
}
