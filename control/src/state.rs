use waystation_core::{BreakpointRegistry, Config, EventBus, FreezeCoordinator, SnapshotStore};

use crate::auth::AuthConfig;

/// Shared application state for both transports the control plane hosts.
/// Every collection inside is already `Arc`-backed by `waystation-core`, so
/// cloning `AppState` is cheap and safe to hand to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub breakpoints: BreakpointRegistry,
    pub freezes: FreezeCoordinator,
    pub snapshots: SnapshotStore,
    pub events: EventBus,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let events = EventBus::new(config.event_bus.subscriber_capacity);
        let freezes = FreezeCoordinator::new(
            config.freeze.default_timeout_secs,
            config.freeze.release_grace_period_ms,
            events.clone(),
        );
        let auth = AuthConfig::from_control_plane_config(&config.control_plane);

        Self {
            config,
            breakpoints: BreakpointRegistry::new(),
            freezes,
            snapshots: SnapshotStore::new(),
            events,
            auth,
        }
    }
}
