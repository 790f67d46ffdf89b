use crate::model::{ApplicationSnapshot, NetworkSnapshot, TopologyLink};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-service liveness, derived from the last time any snapshot arrived for
/// that service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceHealth {
    Active,
    NoHeartbeatsYet,
}

/// Holds network snapshots (first-write-wins, one per trace), application
/// snapshots (append-only, arrival order), and derives topology and
/// per-service health from the application snapshots observed so far.
#[derive(Clone)]
pub struct SnapshotStore {
    network: Arc<RwLock<HashMap<String, NetworkSnapshot>>>,
    app: Arc<RwLock<HashMap<String, Vec<ApplicationSnapshot>>>>,
    last_seen: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            network: Arc::new(RwLock::new(HashMap::new())),
            app: Arc::new(RwLock::new(HashMap::new())),
            last_seen: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records a network snapshot. If one already exists for this trace it is
    /// left untouched — first write wins. Returns `true` if this call's
    /// snapshot was the one stored.
    pub async fn record_network(&self, snapshot: NetworkSnapshot) -> bool {
        self.touch(&snapshot.service_name).await;
        let mut guard = self.network.write().await;
        if guard.contains_key(&snapshot.trace_id) {
            return false;
        }
        guard.insert(snapshot.trace_id.clone(), snapshot);
        true
    }

    pub async fn get_network(&self, trace_id: &str) -> Option<NetworkSnapshot> {
        self.network.read().await.get(trace_id).cloned()
    }

    /// Appends an application snapshot. Display order is arrival order; this
    /// is not a causal-order guarantee across services.
    pub async fn record_app(&self, snapshot: ApplicationSnapshot) {
        self.touch(&snapshot.service_name).await;
        let mut guard = self.app.write().await;
        guard
            .entry(snapshot.trace_id.clone())
            .or_default()
            .push(snapshot);
    }

    pub async fn get_app(&self, trace_id: &str) -> Vec<ApplicationSnapshot> {
        self.app.read().await.get(trace_id).cloned().unwrap_or_default()
    }

    async fn touch(&self, service: &str) {
        self.last_seen
            .write()
            .await
            .insert(service.to_string(), Utc::now());
    }

    /// Derives directed service links from consecutive application
    /// snapshots within each trace, skipping self-links and deduplicating
    /// across all traces.
    pub async fn topology(&self) -> Vec<TopologyLink> {
        let app = self.app.read().await;
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for snapshots in app.values() {
            for pair in snapshots.windows(2) {
                let source = &pair[0].service_name;
                let target = &pair[1].service_name;
                if source == target {
                    continue;
                }
                let link = TopologyLink {
                    source: source.clone(),
                    target: target.clone(),
                };
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }
        }

        links
    }

    /// Reports health for every service that has ever sent a snapshot.
    /// `NoHeartbeatsYet` is never actually returned here since presence in
    /// `last_seen` implies at least one heartbeat; it exists for services a
    /// caller knows about (e.g. from breakpoint registrations) but that have
    /// not yet sent anything, which callers layer in themselves.
    pub async fn service_health(&self) -> HashMap<String, (ServiceHealth, DateTime<Utc>)> {
        self.last_seen
            .read()
            .await
            .iter()
            .map(|(service, seen_at)| (service.clone(), (ServiceHealth::Active, *seen_at)))
            .collect()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(trace_id: &str, service: &str, body: &str) -> NetworkSnapshot {
        NetworkSnapshot {
            trace_id: trace_id.to_string(),
            service_name: service.to_string(),
            method: "POST /orders".to_string(),
            body: body.to_string(),
        }
    }

    fn app(trace_id: &str, service: &str, checkpoint: &str) -> ApplicationSnapshot {
        ApplicationSnapshot {
            trace_id: trace_id.to_string(),
            service_name: service.to_string(),
            checkpoint: checkpoint.to_string(),
            stack_trace: String::new(),
            local_variables: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn network_snapshot_is_first_write_wins() {
        let store = SnapshotStore::new();
        assert!(store.record_network(network("t1", "orders", "first")).await);
        assert!(!store.record_network(network("t1", "orders", "second")).await);

        let stored = store.get_network("t1").await.unwrap();
        assert_eq!(stored.body, "first");
    }

    #[tokio::test]
    async fn app_snapshots_are_stored_in_arrival_order() {
        let store = SnapshotStore::new();
        store.record_app(app("t1", "orders", "start")).await;
        store.record_app(app("t1", "payments", "charge")).await;

        let snapshots = store.get_app("t1").await;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].checkpoint, "start");
        assert_eq!(snapshots[1].checkpoint, "charge");
    }

    #[tokio::test]
    async fn topology_skips_self_links_and_dedups_across_traces() {
        let store = SnapshotStore::new();
        store.record_app(app("t1", "orders", "a")).await;
        store.record_app(app("t1", "orders", "b")).await;
        store.record_app(app("t1", "payments", "c")).await;

        store.record_app(app("t2", "orders", "a")).await;
        store.record_app(app("t2", "payments", "b")).await;

        let topology = store.topology().await;
        assert_eq!(topology.len(), 1);
        assert_eq!(topology[0].source, "orders");
        assert_eq!(topology[0].target, "payments");
    }

    #[tokio::test]
    async fn service_health_tracks_every_service_seen() {
        let store = SnapshotStore::new();
        store.record_network(network("t1", "orders", "body")).await;
        store.record_app(app("t1", "payments", "checkpoint")).await;

        let health = store.service_health().await;
        assert!(health.contains_key("orders"));
        assert!(health.contains_key("payments"));
        assert_eq!(health["orders"].0, ServiceHealth::Active);
    }
}
