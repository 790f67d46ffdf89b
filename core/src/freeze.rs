use crate::error::WaystationError;
use crate::event_bus::EventBus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Lifecycle of a single trace-wide freeze. `Preparing` is carried for wire
/// compatibility but `InitiateFreeze` moves straight to `Frozen` — there is
/// no per-service acknowledgment protocol to justify a separate commit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeState {
    Preparing,
    Frozen,
    Releasing,
    Completed,
    Failed,
}

impl FreezeState {
    fn is_active(self) -> bool {
        matches!(self, FreezeState::Preparing | FreezeState::Frozen | FreezeState::Releasing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFreeze {
    pub trace_id: String,
    pub services: Vec<String>,
    pub state: FreezeState,
    pub created_at: DateTime<Utc>,
    pub frozen_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub timeout_secs: u64,
}

/// Coordinates the freeze lifecycle for every trace currently known to the
/// control plane. All mutable state lives behind single read-write locks,
/// per `TraceFreeze`/override map, matching the rest of the crate's
/// concurrency discipline.
#[derive(Clone)]
pub struct FreezeCoordinator {
    freezes: Arc<RwLock<HashMap<String, TraceFreeze>>>,
    overrides: Arc<RwLock<HashMap<String, String>>>,
    events: EventBus,
    default_timeout_secs: u64,
    release_grace_period_ms: u64,
}

impl FreezeCoordinator {
    pub fn new(default_timeout_secs: u64, release_grace_period_ms: u64, events: EventBus) -> Self {
        Self {
            freezes: Arc::new(RwLock::new(HashMap::new())),
            overrides: Arc::new(RwLock::new(HashMap::new())),
            events,
            default_timeout_secs,
            release_grace_period_ms,
        }
    }

    /// Begins a freeze for `trace_id` across `services`. Fails with
    /// [`WaystationError::Conflict`] if the trace already has an active
    /// (non-terminal) freeze — first-freeze-wins per trace.
    pub async fn initiate_freeze(
        &self,
        trace_id: String,
        services: Vec<String>,
        timeout_secs: Option<u64>,
    ) -> Result<TraceFreeze, WaystationError> {
        let mut guard = self.freezes.write().await;
        if let Some(existing) = guard.get(&trace_id) {
            if existing.state.is_active() {
                return Err(WaystationError::Conflict(format!(
                    "trace {} already has an active freeze",
                    trace_id
                )));
            }
        }

        let now = Utc::now();
        let freeze = TraceFreeze {
            trace_id: trace_id.clone(),
            services,
            state: FreezeState::Frozen,
            created_at: now,
            frozen_at: Some(now),
            released_at: None,
            timeout_secs: timeout_secs.unwrap_or(self.default_timeout_secs),
        };
        guard.insert(trace_id.clone(), freeze.clone());
        drop(guard);

        self.events.publish_freeze_lifecycle(&trace_id, "frozen").await;
        self.spawn_timeout_task(trace_id, freeze.timeout_secs);
        Ok(freeze)
    }

    /// Aborts a freeze on an unexpected internal error: transitions to
    /// `Failed`, broadcasts the transition, and removes the record.
    pub async fn mark_failed(&self, trace_id: &str) {
        self.freezes.write().await.remove(trace_id);
        self.events.publish_freeze_lifecycle(trace_id, "failed").await;
    }

    fn spawn_timeout_task(&self, trace_id: String, timeout_secs: u64) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
            if coordinator.is_frozen(&trace_id).await {
                info!(trace_id = %trace_id, "freeze timed out, auto-releasing");
                let _ = coordinator.release_freeze(&trace_id, None).await;
            }
        });
    }

    pub async fn is_frozen(&self, trace_id: &str) -> bool {
        self.freezes
            .read()
            .await
            .get(trace_id)
            .map(|f| f.state == FreezeState::Frozen)
            .unwrap_or(false)
    }

    pub async fn get_status(&self, trace_id: &str) -> Option<TraceFreeze> {
        self.freezes.read().await.get(trace_id).cloned()
    }

    /// Lists freezes currently suspending traffic. `Releasing` records are
    /// excluded even though they still occupy the map during the grace
    /// period — `GetFreezeStatus` is the only way to observe one of those.
    pub async fn list_active(&self) -> Vec<TraceFreeze> {
        self.freezes
            .read()
            .await
            .values()
            .filter(|f| f.state == FreezeState::Frozen)
            .cloned()
            .collect()
    }

    /// Releases a trace's freeze. If `override_body` is non-empty, it is
    /// stored as a pop-once override so a `/check` poll arriving during the
    /// release grace period still resolves to `allow` with that body.
    /// Returns `NotFound` if the trace has no active freeze.
    pub async fn release_freeze(
        &self,
        trace_id: &str,
        override_body: Option<String>,
    ) -> Result<(), WaystationError> {
        let released = {
            let mut guard = self.freezes.write().await;
            match guard.get_mut(trace_id) {
                Some(freeze) if freeze.state.is_active() => {
                    freeze.state = FreezeState::Releasing;
                    freeze.released_at = Some(Utc::now());
                    true
                }
                Some(_) => false,
                None => {
                    return Err(WaystationError::NotFound(format!(
                        "no freeze found for trace {}",
                        trace_id
                    )))
                }
            }
        };

        if !released {
            return Ok(());
        }

        if let Some(body) = override_body.filter(|b| !b.is_empty()) {
            self.overrides.write().await.insert(trace_id.to_string(), body);
        }

        self.events.publish_freeze_lifecycle(trace_id, "released").await;
        self.schedule_completion(trace_id.to_string());
        Ok(())
    }

    /// After the grace period, the record is removed entirely — a trace id
    /// absent from the registry is "not frozen", so `GetFreezeStatus` reports
    /// `not_found` once the grace period has passed. The grace period itself
    /// exists so a `/check` poll issued just
    /// before release still observes `Releasing` (non-frozen, so "allow")
    /// and can still pop the override before the record disappears.
    fn schedule_completion(&self, trace_id: String) {
        let coordinator = self.clone();
        let grace_period = Duration::from_millis(self.release_grace_period_ms);
        tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            let mut guard = coordinator.freezes.write().await;
            if let Some(freeze) = guard.get_mut(&trace_id) {
                freeze.state = FreezeState::Completed;
            }
            guard.remove(&trace_id);
            drop(guard);
            coordinator.overrides.write().await.remove(&trace_id);
        });
    }

    /// Pop-once check: does `trace_id` currently have a pending release
    /// override body? If so, consumes it atomically so a later poll for the
    /// same trace does not see it again.
    pub async fn consume_override(&self, trace_id: &str) -> Option<String> {
        self.overrides.write().await.remove(trace_id)
    }

    /// Releases every currently active freeze. Returns the number of
    /// freezes that were active immediately before this call.
    pub async fn emergency_release(&self) -> usize {
        let active_ids: Vec<String> = self
            .list_active()
            .await
            .into_iter()
            .map(|f| f.trace_id)
            .collect();
        let count = active_ids.len();

        for trace_id in active_ids {
            if let Err(err) = self.release_freeze(&trace_id, None).await {
                warn!(trace_id = %trace_id, error = %err.message(), "emergency release failed for trace");
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> FreezeCoordinator {
        FreezeCoordinator::new(30, 5_000, EventBus::new(16))
    }

    #[tokio::test]
    async fn initiate_then_duplicate_fails_with_conflict() {
        let coordinator = coordinator();
        coordinator
            .initiate_freeze("t1".to_string(), vec!["orders".to_string()], None)
            .await
            .unwrap();

        let result = coordinator
            .initiate_freeze("t1".to_string(), vec!["orders".to_string()], None)
            .await;
        assert!(matches!(result, Err(WaystationError::Conflict(_))));
    }

    #[tokio::test]
    async fn release_without_active_freeze_is_not_found() {
        let coordinator = coordinator();
        let result = coordinator.release_freeze("unknown", None).await;
        assert!(matches!(result, Err(WaystationError::NotFound(_))));
    }

    #[tokio::test]
    async fn release_moves_trace_out_of_frozen_state_immediately() {
        let coordinator = coordinator();
        coordinator
            .initiate_freeze("t1".to_string(), vec!["orders".to_string()], None)
            .await
            .unwrap();
        assert!(coordinator.is_frozen("t1").await);

        coordinator.release_freeze("t1", None).await.unwrap();
        assert!(!coordinator.is_frozen("t1").await);
    }

    #[tokio::test]
    async fn release_with_override_is_consumable_exactly_once() {
        let coordinator = coordinator();
        coordinator
            .initiate_freeze("t1".to_string(), vec!["orders".to_string()], None)
            .await
            .unwrap();
        coordinator
            .release_freeze("t1", Some("replacement-body".to_string()))
            .await
            .unwrap();

        assert_eq!(
            coordinator.consume_override("t1").await.as_deref(),
            Some("replacement-body")
        );
        assert_eq!(coordinator.consume_override("t1").await, None);
    }

    #[tokio::test]
    async fn emergency_release_returns_pre_call_active_count() {
        let coordinator = coordinator();
        coordinator
            .initiate_freeze("t1".to_string(), vec!["a".to_string()], None)
            .await
            .unwrap();
        coordinator
            .initiate_freeze("t2".to_string(), vec!["b".to_string()], None)
            .await
            .unwrap();

        let released = coordinator.emergency_release().await;
        assert_eq!(released, 2);
        assert!(coordinator.list_active().await.is_empty());
    }

    #[tokio::test]
    async fn freeze_auto_releases_after_timeout() {
        let coordinator = FreezeCoordinator::new(0, 0, EventBus::new(16));
        coordinator
            .initiate_freeze("t1".to_string(), vec!["a".to_string()], Some(0))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!coordinator.is_frozen("t1").await);
    }
}
