//! Activity trait and registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// A single named unit of work scheduled by the orchestrator.
///
/// Activities are stateless from the engine's point of view: input in,
/// JSON-serializable output (or failure) out. The engine records at most one
/// success per task, but the hosting layer may invoke an activity more than
/// once for the same task before the outcome is durably appended, so any
/// side effect an activity has must be idempotent (overwrite by key, never
/// append).
#[async_trait]
pub trait Activity: Send + Sync {
    /// Execute the activity against an input payload.
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value>;

    /// Get the activity name (for registry lookup and logging).
    fn name(&self) -> &str;
}

/// Registry of activities, keyed by name.
#[derive(Default)]
pub struct ActivityRegistry {
    activities: HashMap<String, Arc<dyn Activity>>,
}

impl ActivityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an activity under its own name.
    pub fn register(&mut self, activity: Arc<dyn Activity>) {
        self.activities.insert(activity.name().to_string(), activity);
    }

    /// Get an activity by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Activity>> {
        self.activities.get(name).cloned()
    }

    /// Check if an activity is registered.
    pub fn has(&self, name: &str) -> bool {
        self.activities.contains_key(name)
    }

    /// Get all registered activity names.
    pub fn names(&self) -> Vec<&str> {
        self.activities.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered activities.
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

/// An activity that runs a closure.
pub struct FnActivity<F>
where
    F: Fn(&serde_json::Value) -> Result<serde_json::Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnActivity<F>
where
    F: Fn(&serde_json::Value) -> Result<serde_json::Value> + Send + Sync,
{
    /// Create a new function activity.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Activity for FnActivity<F>
where
    F: Fn(&serde_json::Value) -> Result<serde_json::Value> + Send + Sync,
{
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        (self.func)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An activity that always fails (for testing failure paths).
pub struct FailingActivity {
    name: String,
    error_message: String,
}

impl FailingActivity {
    /// Create a new failing activity.
    pub fn new(name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error_message: error_message.into(),
        }
    }
}

#[async_trait]
impl Activity for FailingActivity {
    async fn execute(&self, _input: &serde_json::Value) -> Result<serde_json::Value> {
        Err(Error::activity_failed(&self.name, &self.error_message))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An activity that fails a fixed number of times, then delegates.
///
/// Used to exercise retry policies: the first `failures` invocations return
/// a transient error, subsequent invocations run the inner activity.
pub struct FlakyActivity {
    inner: Arc<dyn Activity>,
    failures: u32,
    invocations: AtomicU32,
}

impl FlakyActivity {
    /// Wrap an activity so its first `failures` invocations fail.
    pub fn new(inner: Arc<dyn Activity>, failures: u32) -> Self {
        Self {
            inner,
            failures,
            invocations: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Activity for FlakyActivity {
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst);
        if invocation < self.failures {
            return Err(Error::activity_failed(
                self.inner.name(),
                format!("transient failure on invocation {}", invocation + 1),
            ));
        }
        self.inner.execute(input).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_activity() {
        let activity = FnActivity::new("echo", |input| Ok(input.clone()));
        let result = activity.execute(&json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_failing_activity() {
        let activity = FailingActivity::new("broken", "always down");
        let result = activity.execute(&json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_flaky_activity_recovers() {
        let inner = Arc::new(FnActivity::new("fragile", |_| Ok(json!({"ok": true}))));
        let flaky = FlakyActivity::new(inner, 1);

        assert!(flaky.execute(&json!({})).await.is_err());
        assert!(flaky.execute(&json!({})).await.is_ok());
    }

    #[test]
    fn test_registry() {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(FnActivity::new("echo", |input| Ok(input.clone()))));
        registry.register(Arc::new(FailingActivity::new("broken", "down")));

        assert!(registry.has("echo"));
        assert!(registry.has("broken"));
        assert!(!registry.has("missing"));
        assert_eq!(registry.len(), 2);
    }
}
