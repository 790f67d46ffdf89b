use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A declarative rule whose matching initiates a freeze.
///
/// `id` is unique and stable; the same `(service, endpoint, conditions)` tuple
/// may coexist as duplicates under different ids — they fire identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: String,
    pub service: String,
    /// Substring-matched against the observed endpoint, not a prefix or exact match.
    pub endpoint: String,
    pub conditions: HashMap<String, String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// A live trace event, fanned out to subscribers but never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace_id: String,
    pub service: String,
    pub endpoint: String,
    pub unix_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, String>>,
}

/// The request line + body captured at the moment a sidecar first freezes a
/// request. One per trace id — first write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub trace_id: String,
    pub service_name: String,
    /// `"<METHOD> <PATH>"`, e.g. `"POST /orders"`.
    pub method: String,
    pub body: String,
}

/// An in-process checkpoint pushed by application instrumentation: locals,
/// stack, checkpoint name. Multiple per trace, stored in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub trace_id: String,
    pub service_name: String,
    pub checkpoint: String,
    pub stack_trace: String,
    #[serde(default)]
    pub local_variables: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// A directed service dependency link derived from consecutive application
/// snapshots within a trace ("hop journey").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TopologyLink {
    pub source: String,
    pub target: String,
}

/// A freeze state-machine transition, broadcast to subscribers alongside
/// live trace events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeLifecycleEvent {
    pub trace_id: String,
    /// `"frozen"`, `"released"`, or `"failed"` — the state just entered.
    pub state: String,
    pub unix_seconds: i64,
}

/// The event bus's single wire type: either kind a `StreamTraces` subscriber
/// wants to observe, tagged so clients can discriminate without two streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusEvent {
    Trace(TraceEvent),
    FreezeLifecycle(FreezeLifecycleEvent),
}
