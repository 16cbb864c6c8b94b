//! Result store: durable, idempotent persistence of final workflow output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Partition key used for all analysis results.
pub const RESULTS_PARTITION: &str = "image-analysis";

/// One stored workflow result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    /// Logical grouping key.
    pub partition_key: String,
    /// Result identifier within the partition.
    pub row_key: String,
    /// Serialized report payload.
    pub report: serde_json::Value,
    /// When the result was first stored.
    pub stored_at: DateTime<Utc>,
}

impl StoredResult {
    /// Create a new stored result in the default partition.
    pub fn new(row_key: impl Into<String>, report: serde_json::Value) -> Self {
        Self {
            partition_key: RESULTS_PARTITION.to_string(),
            row_key: row_key.into(),
            report,
            stored_at: Utc::now(),
        }
    }
}

/// Trait for result storage backends.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Idempotent upsert keyed by `row_key`: repeating the call with the
    /// same key and content leaves exactly one record with that content.
    async fn put(&self, result: StoredResult) -> Result<()>;

    /// Get a stored result by its row key.
    async fn get(&self, row_key: &str) -> Result<Option<StoredResult>>;

    /// List all stored results, newest first. Each call is a fresh scan.
    async fn list_all(&self) -> Result<Vec<StoredResult>>;
}

/// In-memory result store.
#[derive(Default)]
pub struct InMemoryResultStore {
    results: tokio::sync::RwLock<std::collections::HashMap<String, StoredResult>>,
}

impl InMemoryResultStore {
    /// Create a new in-memory result store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, result: StoredResult) -> Result<()> {
        let mut results = self.results.write().await;
        match results.get_mut(&result.row_key) {
            // Upsert keeps the original stored_at so repeated persistence of
            // the same result is invisible to readers.
            Some(existing) => existing.report = result.report,
            None => {
                results.insert(result.row_key.clone(), result);
            }
        }
        Ok(())
    }

    async fn get(&self, row_key: &str) -> Result<Option<StoredResult>> {
        Ok(self.results.read().await.get(row_key).cloned())
    }

    async fn list_all(&self) -> Result<Vec<StoredResult>> {
        Ok(self
            .results
            .read()
            .await
            .values()
            .cloned()
            .sorted_by(|a, b| b.stored_at.cmp(&a.stored_at))
            .collect_vec())
    }
}
