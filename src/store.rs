//! Workflow store: the pluggable persistence backend
//!
//! [`WorkflowStore`] is the interface every backend satisfies; the engine
//! never talks to storage any other way. [`InMemoryWorkflowStore`] is the
//! reference implementation, used in tests and for single-process
//! deployments. Durable backends (sqlite, postgres, an external workflow
//! service) implement the same four operations.
//!
//! Rows are serialized to self-describing JSON on `save` and parsed on
//! `load`, so what the in-memory store exercises is exactly what a durable
//! backend would: unknown-field preservation and serialization failures are
//! real here, not simulated.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::scope::RequestScope;
use crate::workflow::{WorkflowFilter, WorkflowState};
use crate::{Error, Result};

/// Persistence contract for workflow states.
///
/// All operations are safe for concurrent callers and linearizable per
/// workflow ID. No cross-workflow transaction is offered.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persists the state by `workflow_id`, overwriting any previous row.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] on an empty workflow ID; [`Error::Storage`]
    /// on backend failure.
    async fn save(&self, scope: &RequestScope, state: &WorkflowState) -> Result<()>;

    /// Loads a state. A missing row is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] on backend failure; [`Error::Serialization`] on a
    /// corrupt payload.
    async fn load(&self, scope: &RequestScope, workflow_id: &str)
    -> Result<Option<WorkflowState>>;

    /// Lists states matching the filter.
    ///
    /// Order is unspecified but stable for a given store instance across
    /// concurrent calls. A zero limit means unbounded.
    async fn list(&self, scope: &RequestScope, filter: &WorkflowFilter)
    -> Result<Vec<WorkflowState>>;

    /// Deletes a state. Deleting a missing workflow is not an error.
    async fn delete(&self, scope: &RequestScope, workflow_id: &str) -> Result<()>;
}

/// In-memory store. Not persistent across processes.
///
/// Rows are kept as serialized JSON in a `BTreeMap`, which gives the
/// listing a stable (key-sorted) order for the lifetime of the instance.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    rows: tokio::sync::RwLock<BTreeMap<String, String>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored workflows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save(&self, scope: &RequestScope, state: &WorkflowState) -> Result<()> {
        scope.check()?;
        if state.workflow_id.trim().is_empty() {
            return Err(Error::invalid_input("workflow_id cannot be empty"));
        }
        let encoded = serde_json::to_string(state)
            .map_err(|e| Error::serialization(format!("workflow state: {e}")))?;
        self.rows
            .write()
            .await
            .insert(state.workflow_id.clone(), encoded);
        Ok(())
    }

    async fn load(
        &self,
        scope: &RequestScope,
        workflow_id: &str,
    ) -> Result<Option<WorkflowState>> {
        scope.check()?;
        let rows = self.rows.read().await;
        match rows.get(workflow_id) {
            None => Ok(None),
            Some(encoded) => {
                let state = serde_json::from_str(encoded).map_err(|e| {
                    Error::serialization(format!("workflow {workflow_id:?}: {e}"))
                })?;
                Ok(Some(state))
            }
        }
    }

    async fn list(
        &self,
        scope: &RequestScope,
        filter: &WorkflowFilter,
    ) -> Result<Vec<WorkflowState>> {
        scope.check()?;
        let rows = self.rows.read().await;
        let mut states = Vec::new();
        for (workflow_id, encoded) in rows.iter() {
            let state: WorkflowState = serde_json::from_str(encoded).map_err(|e| {
                Error::serialization(format!("workflow {workflow_id:?}: {e}"))
            })?;
            if filter.matches(&state) {
                states.push(state);
                if filter.limit > 0 && states.len() == filter.limit {
                    break;
                }
            }
        }
        Ok(states)
    }

    async fn delete(&self, scope: &RequestScope, workflow_id: &str) -> Result<()> {
        scope.check()?;
        self.rows.write().await.remove(workflow_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowStatus;
    use serde_json::json;

    fn state(id: &str) -> WorkflowState {
        WorkflowState::new(id, format!("{id}-run"), json!(null))
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();

        let mut saved = state("wf-1");
        saved.transition_to(WorkflowStatus::Running).unwrap();
        store.save(&scope, &saved).await.unwrap();

        let loaded = store.load(&scope, "wf-1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        assert!(store.load(&scope, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_empty_id_rejected() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        let err = store.save(&scope, &state("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_save_twice_is_idempotent() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        let s = state("wf-1");
        store.save(&scope, &s).await.unwrap();
        store.save(&scope, &s).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.load(&scope, "wf-1").await.unwrap().unwrap(), s);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        store.save(&scope, &state("wf-1")).await.unwrap();

        store.delete(&scope, "wf-1").await.unwrap();
        store.delete(&scope, "wf-1").await.unwrap();
        assert!(store.load(&scope, "wf-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();

        let mut running = state("wf-running");
        running.transition_to(WorkflowStatus::Running).unwrap();
        store.save(&scope, &running).await.unwrap();
        store.save(&scope, &state("wf-pending")).await.unwrap();

        let filter = WorkflowFilter::new().with_status(WorkflowStatus::Running);
        let states = store.list(&scope, &filter).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].workflow_id, "wf-running");
    }

    #[tokio::test]
    async fn test_list_limit_zero_is_unbounded() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        for i in 0..5 {
            store.save(&scope, &state(&format!("wf-{i}"))).await.unwrap();
        }

        let all = store
            .list(&scope, &WorkflowFilter::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);

        let capped = store
            .list(&scope, &WorkflowFilter::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn test_list_order_stable() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        for id in ["wf-c", "wf-a", "wf-b"] {
            store.save(&scope, &state(id)).await.unwrap();
        }

        let first: Vec<String> = store
            .list(&scope, &WorkflowFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.workflow_id)
            .collect();
        let second: Vec<String> = store
            .list(&scope, &WorkflowFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.workflow_id)
            .collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_canceled_scope_rejected() {
        let store = InMemoryWorkflowStore::new();
        let scope = RequestScope::new();
        scope.cancel();
        assert!(store.save(&scope, &state("wf-1")).await.is_err());
        assert!(store.load(&scope, "wf-1").await.is_err());
    }
}
