//! Submission model and record stores for the murmur reconciliation engine.
//!
//! Two stores hold overlapping views of every submission:
//!
//! - the **primary** store ([`PrimaryStore`]) owns identity and content,
//! - the **workflow** store ([`WorkflowStore`]) owns moderation and
//!   publication decisions.
//!
//! Backends: [`postgres::PgPrimaryStore`], [`http::HttpWorkflowStore`] and
//! the isolated doubles in [`memory`].

pub mod error;
pub mod http;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod retry;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use model::{
    PrimaryUpdate, RiskFlags, Submission, SubmissionId, SubmissionStatus, WorkflowDocument,
};
pub use query::{Page, PageRequest, SubmissionFilter};
pub use retry::RetryPolicy;
pub use traits::{PrimaryStore, WorkflowStore};
