use crate::model::Breakpoint;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Pure in-memory breakpoint CRUD. Register and delete are write-locked;
/// list is read-locked and O(n).
#[derive(Clone)]
pub struct BreakpointRegistry {
    inner: Arc<RwLock<HashMap<String, Breakpoint>>>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(
        &self,
        service: String,
        endpoint: String,
        conditions: HashMap<String, String>,
    ) -> Breakpoint {
        let breakpoint = Breakpoint {
            id: Uuid::new_v4().to_string(),
            service,
            endpoint,
            conditions,
            enabled: true,
            created_at: Utc::now(),
        };

        let mut guard = self.inner.write().await;
        guard.insert(breakpoint.id.clone(), breakpoint.clone());
        breakpoint
    }

    pub async fn list(&self) -> Vec<Breakpoint> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Returns `true` if a breakpoint with this id existed and was removed.
    pub async fn delete(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_list_returns_it_with_a_fresh_id() {
        let registry = BreakpointRegistry::new();
        let bp = registry
            .register(
                "orders".to_string(),
                "/order".to_string(),
                HashMap::from([("body.amount".to_string(), "999".to_string())]),
            )
            .await;

        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, bp.id);
        assert_eq!(listed[0].service, "orders");
    }

    #[tokio::test]
    async fn delete_removes_and_reports_not_found_on_repeat() {
        let registry = BreakpointRegistry::new();
        let bp = registry
            .register("orders".to_string(), "/order".to_string(), HashMap::new())
            .await;

        assert!(registry.delete(&bp.id).await);
        assert!(!registry.delete(&bp.id).await);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_tuples_coexist_under_distinct_ids() {
        let registry = BreakpointRegistry::new();
        let a = registry
            .register("svc".to_string(), "/x".to_string(), HashMap::new())
            .await;
        let b = registry
            .register("svc".to_string(), "/x".to_string(), HashMap::new())
            .await;

        assert_ne!(a.id, b.id);
        assert_eq!(registry.list().await.len(), 2);
    }
}
