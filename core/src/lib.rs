pub mod breakpoints;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod freeze;
pub mod match_engine;
pub mod model;
pub mod snapshot;
pub mod trace_id;

pub use breakpoints::BreakpointRegistry;
pub use config::Config;
pub use error::WaystationError;
pub use event_bus::EventBus;
pub use freeze::{FreezeCoordinator, FreezeState, TraceFreeze};
pub use model::{
    ApplicationSnapshot, Breakpoint, BusEvent, FreezeLifecycleEvent, NetworkSnapshot,
    TopologyLink, TraceEvent,
};
pub use snapshot::{ServiceHealth, SnapshotStore};
pub use trace_id::extract_trace_id;
