//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use murmur_store::memory::{InMemoryPrimaryStore, InMemoryWorkflowStore};
use murmur_store::Submission;
use murmur_sync::SyncEngine;

/// Fixed base time so ordering is deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
}

/// A fresh pending submission created `minutes` after the base time.
pub fn submission(id: &str, minutes: i64) -> Submission {
    let mut s = Submission::new(
        id,
        "river",
        format!("voice note {id}"),
        base_time() + Duration::minutes(minutes),
    );
    s.audio_url = Some(format!("https://cdn.example/{id}.mp3"));
    s.color = "teal".to_string();
    s
}

/// `count` submissions named `s000`, `s001`, ...
pub fn submissions(count: usize) -> Vec<Submission> {
    (0..count)
        .map(|i| submission(&format!("s{i:03}"), i as i64))
        .collect()
}

/// Isolated store doubles plus an engine over them.
pub struct Harness {
    pub primary: Arc<InMemoryPrimaryStore>,
    pub workflow: Arc<InMemoryWorkflowStore>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new(primary: InMemoryPrimaryStore, workflow: InMemoryWorkflowStore) -> Self {
        let primary = Arc::new(primary);
        let workflow = Arc::new(workflow);
        let engine = SyncEngine::new(primary.clone(), workflow.clone());
        Self {
            primary,
            workflow,
            engine,
        }
    }

    pub fn with_submissions(submissions: Vec<Submission>) -> Self {
        Self::new(
            InMemoryPrimaryStore::with_submissions(submissions),
            InMemoryWorkflowStore::new(),
        )
    }
}
