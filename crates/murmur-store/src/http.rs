//! HTTP workflow store (reqwest-based).
//!
//! Talks to a JSON document API scoped by dataset and authenticated with a
//! bearer token. Every call goes through the injected [`RetryPolicy`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::model::{SubmissionId, WorkflowDocument};
use crate::query::{Page, PageRequest, SubmissionFilter};
use crate::retry::RetryPolicy;
use crate::traits::WorkflowStore;

/// Settings for [`HttpWorkflowStore::new`].
#[derive(Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the document API, e.g. `https://api.example.com`.
    pub base_url: String,
    pub token: String,
    /// Dataset the documents live in (one per environment).
    pub dataset: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for HttpStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStoreConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[redacted]")
            .field("dataset", &self.dataset)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Workflow store backed by the document API.
#[derive(Clone)]
pub struct HttpWorkflowStore {
    base_url: Url,
    dataset: String,
    token: String,
    http_client: Client,
    retry: RetryPolicy,
    transactions: bool,
}

impl fmt::Debug for HttpWorkflowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWorkflowStore")
            .field("base_url", &self.base_url.as_str())
            .field("dataset", &self.dataset)
            .field("transactions", &self.transactions)
            .finish_non_exhaustive()
    }
}

impl HttpWorkflowStore {
    /// Create a store with its own HTTP client.
    pub fn new(config: &HttpStoreConfig, retry: RetryPolicy) -> StoreResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                StoreError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Self::with_http_client(config, http_client, retry)
    }

    /// Create a store with a pre-built `reqwest::Client` (for testing).
    pub fn with_http_client(
        config: &HttpStoreConfig,
        http_client: Client,
        retry: RetryPolicy,
    ) -> StoreResult<Self> {
        if config.dataset.trim().is_empty() {
            return Err(StoreError::invalid_configuration("dataset is empty"));
        }
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            StoreError::invalid_configuration(format!(
                "invalid workflow API url '{}': {e}",
                config.base_url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::invalid_configuration(format!(
                "workflow API url '{}' cannot be used as a base",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            dataset: config.dataset.clone(),
            token: config.token.clone(),
            http_client,
            retry,
            transactions: true,
        })
    }

    /// Enable or disable the atomic mutate endpoint.
    #[must_use]
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.transactions = enabled;
        self
    }

    // ── URLs ──────────────────────────────────────────────────────────

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["v1", "data", self.dataset.as_str()])
                .extend(segments);
        }
        url
    }

    fn filter_params(filter: &SubmissionFilter) -> Vec<(&'static str, String)> {
        let mut params = vec![("includeRejected", filter.include_rejected.to_string())];
        if let Some(status) = filter.status {
            params.push(("status", status.as_str().to_string()));
        }
        params
    }

    // ── Internal HTTP methods ─────────────────────────────────────────

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> StoreResult<T> {
        debug!("Workflow GET {}", url);
        let response = self
            .authorized(self.http_client.get(url.clone()))
            .query(query)
            .send()
            .await?;
        handle_response(response).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        builder: RequestBuilder,
        url: &Url,
        body: &B,
    ) -> StoreResult<reqwest::Response> {
        debug!("Workflow write {}", url);
        let response = self.authorized(builder).json(body).send().await?;
        Ok(response)
    }
}

#[async_trait]
impl WorkflowStore for HttpWorkflowStore {
    #[instrument(skip(self), fields(dataset = %self.dataset))]
    async fn list_documents(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<WorkflowDocument>> {
        let url = self.endpoint(&["submissions"]);
        let mut query = Self::filter_params(filter);
        query.push(("offset", page.offset.to_string()));
        query.push(("limit", page.limit.to_string()));

        let (url, query) = (&url, query.as_slice());
        let response: ListResponse = self
            .retry
            .execute("list_documents", || self.get_json(url, query))
            .await?;
        Ok(Page::new(response.documents, response.has_more))
    }

    #[instrument(skip(self), fields(dataset = %self.dataset))]
    async fn count_documents(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        let url = self.endpoint(&["submissions", "count"]);
        let query = Self::filter_params(filter);
        let (url, query) = (&url, query.as_slice());
        let response: CountResponse = self
            .retry
            .execute("count_documents", || self.get_json(url, query))
            .await?;
        Ok(response.count)
    }

    #[instrument(skip(self), fields(submission_id = %id))]
    async fn find_document(&self, id: &SubmissionId) -> StoreResult<Option<WorkflowDocument>> {
        let url = self.endpoint(&["submissions", id.as_str()]);
        let url = &url;
        let result = self
            .retry
            .execute("find_document", || self.get_json(url, &[]))
            .await;
        match result {
            Ok(document) => Ok(Some(document)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_documents(&self, ids: &[SubmissionId]) -> StoreResult<Vec<WorkflowDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&["submissions", "lookup"]);
        let (url, body) = (&url, &LookupRequest { ids });
        let response: LookupResponse = self
            .retry
            .execute("find_documents", || async move {
                let response = self
                    .send_json(self.http_client.post(url.clone()), url, body)
                    .await?;
                handle_response(response).await
            })
            .await?;
        Ok(response.documents)
    }

    #[instrument(skip(self, document), fields(submission_id = %document.submission_id))]
    async fn create_or_replace(&self, document: &WorkflowDocument) -> StoreResult<()> {
        if !document.submission_id.is_valid() {
            return Err(StoreError::rejected("document has no submissionId"));
        }
        let url = &self.endpoint(&["submissions", document.submission_id.as_str()]);
        self.retry
            .execute("create_or_replace", || async move {
                let response = self
                    .send_json(self.http_client.put(url.clone()), url, document)
                    .await?;
                handle_empty(response).await
            })
            .await
    }

    fn supports_transactions(&self) -> bool {
        self.transactions
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn commit_transaction(&self, documents: &[WorkflowDocument]) -> StoreResult<()> {
        if !self.transactions {
            return Err(StoreError::unsupported("commit_transaction"));
        }
        if documents.is_empty() {
            return Ok(());
        }
        let url = &self.endpoint(&["mutate"]);
        let body = &MutateRequest {
            mutations: documents.iter().map(Mutation::CreateOrReplace).collect(),
        };
        self.retry
            .execute("commit_transaction", || async move {
                let response = self
                    .send_json(self.http_client.post(url.clone()), url, body)
                    .await?;
                handle_empty(response).await
            })
            .await
    }
}

// ── Wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WorkflowDocument>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    ids: &'a [SubmissionId],
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    documents: Vec<WorkflowDocument>,
}

#[derive(Debug, Serialize)]
struct MutateRequest<'a> {
    mutations: Vec<Mutation<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Mutation<'a> {
    CreateOrReplace(&'a WorkflowDocument),
}

// ── Response handling ─────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Serialization {
            message: format!("failed to parse response: {e}"),
        })
    } else {
        Err(handle_error_response(response).await)
    }
}

async fn handle_empty(response: reqwest::Response) -> StoreResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(handle_error_response(response).await)
    }
}

async fn handle_error_response(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    map_status(status, retry_after, body)
}

/// Map a non-success HTTP status to a [`StoreError`].
fn map_status(status: StatusCode, retry_after: Option<u64>, body: String) -> StoreError {
    let detail = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body
    };
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound { identifier: detail },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::Rejected { message: detail }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Authentication { message: detail }
        }
        StatusCode::CONFLICT => StoreError::Conflict { message: detail },
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("Workflow store rate limited, retry after {:?}s", retry_after);
            StoreError::RateLimited {
                retry_after_secs: retry_after,
            }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            StoreError::Timeout { message: detail }
        }
        s if s.is_server_error() => StoreError::Unavailable { message: detail },
        _ => StoreError::Rejected {
            message: format!("unexpected HTTP {status}: {detail}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> HttpWorkflowStore {
        HttpWorkflowStore::with_http_client(
            &HttpStoreConfig {
                base_url: base_url.to_string(),
                token: "t".into(),
                dataset: "staging".into(),
                timeout: Duration::from_secs(1),
            },
            Client::new(),
            RetryPolicy::none(),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_builds_dataset_scoped_paths() {
        let store = store("https://api.example.com/");
        assert_eq!(
            store.endpoint(&["submissions", "count"]).as_str(),
            "https://api.example.com/v1/data/staging/submissions/count"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_escapes_ids() {
        let store = store("https://api.example.com/workflow");
        assert_eq!(
            store.endpoint(&["submissions", "a/b c"]).as_str(),
            "https://api.example.com/workflow/v1/data/staging/submissions/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let config = HttpStoreConfig {
            base_url: "not a url".into(),
            token: String::new(),
            dataset: "production".into(),
            timeout: Duration::from_secs(1),
        };
        let err = HttpWorkflowStore::new(&config, RetryPolicy::none()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let config = HttpStoreConfig {
            base_url: "https://api.example.com".into(),
            dataset: " ".into(),
            ..config
        };
        assert!(HttpWorkflowStore::new(&config, RetryPolicy::none()).is_err());
    }

    #[test]
    fn test_status_mapping() {
        let code = |status: StatusCode| map_status(status, None, String::new()).error_code();
        assert_eq!(code(StatusCode::NOT_FOUND), "NOT_FOUND");
        assert_eq!(code(StatusCode::BAD_REQUEST), "REJECTED");
        assert_eq!(code(StatusCode::UNPROCESSABLE_ENTITY), "REJECTED");
        assert_eq!(code(StatusCode::UNAUTHORIZED), "AUTH_FAILED");
        assert_eq!(code(StatusCode::FORBIDDEN), "AUTH_FAILED");
        assert_eq!(code(StatusCode::CONFLICT), "CONFLICT");
        assert_eq!(code(StatusCode::INTERNAL_SERVER_ERROR), "UNAVAILABLE");
        assert_eq!(code(StatusCode::BAD_GATEWAY), "UNAVAILABLE");
        assert_eq!(code(StatusCode::GATEWAY_TIMEOUT), "TIMEOUT");

        match map_status(StatusCode::TOO_MANY_REQUESTS, Some(3), String::new()) {
            StoreError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, Some(3)),
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
    }

    #[test]
    fn test_mutation_wire_format() {
        let document: WorkflowDocument = serde_json::from_value(serde_json::json!({
            "submissionId": "s1",
            "createdAt": "2024-03-01T12:00:00Z"
        }))
        .unwrap();
        let body = MutateRequest {
            mutations: vec![Mutation::CreateOrReplace(&document)],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["mutations"][0]["createOrReplace"]["submissionId"], "s1");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = HttpStoreConfig {
            base_url: "https://api.example.com".into(),
            token: "secret-token".into(),
            dataset: "production".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
