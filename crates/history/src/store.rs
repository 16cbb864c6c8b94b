//! Storage traits for instance records and history logs.

use async_trait::async_trait;
use itertools::Itertools;

use crate::error::Result;
use crate::event::HistoryEvent;
use crate::log::HistoryLog;
use crate::types::{InstanceId, InstanceRecord};

/// Trait for durable orchestration storage backends.
///
/// Appends are atomic per instance; no coordination across instances is
/// required since every key is instance-scoped.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create an instance record if it does not already exist.
    ///
    /// Returns `true` if the record was created, `false` if an instance with
    /// the same id already exists (the existing record is left untouched).
    /// This is what makes at-least-once trigger delivery safe.
    async fn create_instance(&self, record: &InstanceRecord) -> Result<bool>;

    /// Save (overwrite) an instance record.
    async fn save_instance(&self, record: &InstanceRecord) -> Result<()>;

    /// Load an instance record by ID.
    async fn load_instance(&self, id: InstanceId) -> Result<Option<InstanceRecord>>;

    /// List all instance records.
    async fn list_instances(&self) -> Result<Vec<InstanceRecord>>;

    /// Append a batch of history events atomically.
    async fn append_events(&self, id: InstanceId, events: Vec<HistoryEvent>) -> Result<()>;

    /// Load the full history log for an instance.
    async fn load_history(&self, id: InstanceId) -> Result<HistoryLog>;
}

/// In-memory storage implementation.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    instances: tokio::sync::RwLock<std::collections::HashMap<InstanceId, InstanceRecord>>,
    histories: tokio::sync::RwLock<std::collections::HashMap<InstanceId, HistoryLog>>,
}

impl InMemoryHistoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create_instance(&self, record: &InstanceRecord) -> Result<bool> {
        let mut instances = self.instances.write().await;
        if instances.contains_key(&record.id) {
            return Ok(false);
        }
        instances.insert(record.id, record.clone());
        Ok(true)
    }

    async fn save_instance(&self, record: &InstanceRecord) -> Result<()> {
        self.instances
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn load_instance(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
        Ok(self.instances.read().await.get(&id).cloned())
    }

    async fn list_instances(&self) -> Result<Vec<InstanceRecord>> {
        Ok(self.instances.read().await.values().cloned().collect_vec())
    }

    async fn append_events(&self, id: InstanceId, events: Vec<HistoryEvent>) -> Result<()> {
        // Validation happens inside the write lock, so the batch is atomic
        // with respect to concurrent appends for the same instance.
        self.histories
            .write()
            .await
            .entry(id)
            .or_default()
            .append_batch(events)
    }

    async fn load_history(&self, id: InstanceId) -> Result<HistoryLog> {
        Ok(self
            .histories
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}
