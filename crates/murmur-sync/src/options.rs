//! Options for a sync invocation.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Largest accepted page size.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Largest accepted number of concurrent lanes.
pub const MAX_CONCURRENCY: usize = 16;

/// Options recognized by every sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Records per fetched page.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Whether rejected submissions participate in the primary→workflow pass.
    #[serde(default)]
    pub include_rejected: bool,
    /// Compute and count outcomes without writing to the target store.
    #[serde(default)]
    pub dry_run: bool,
    /// Number of lanes records of a batch are partitioned into (1 = sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_batch_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            include_rejected: false,
            dry_run: false,
            concurrency: default_concurrency(),
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_include_rejected(mut self, include_rejected: bool) -> Self {
        self.include_rejected = include_rejected;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Validate before any I/O is attempted.
    pub fn validate(&self) -> SyncResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::configuration(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(SyncError::configuration(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        Ok(())
    }

    /// Page size as sent to the stores.
    pub(crate) fn page_size(&self) -> u32 {
        u32::try_from(self.batch_size).unwrap_or(u32::MAX)
    }
}
