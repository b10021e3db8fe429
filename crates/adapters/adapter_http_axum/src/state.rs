//! Shared application state for axum handlers.

use std::sync::Arc;

use tokio::sync::RwLock;

use minihub_app::event_bus::InProcessEventBus;
use minihub_app::persistence::PersistenceHealth;
use minihub_app::ports::adapter::DiscoveredDevice;
use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};
use minihub_app::services::area_service::AreaService;
use minihub_app::services::registry_service::RegistryService;
use minihub_domain::time::Timestamp;

/// Application state shared across all axum handlers.
///
/// Generic over every repository/sink the HTTP surface reads from directly,
/// plus the registry service that owns device/entity upsert invariants.
/// `Clone` is implemented manually so the underlying types themselves do not
/// need to be `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<DR, ER, AR, LS, HS, CR, HR, ES> {
    pub registry: Arc<RegistryService<DR, ER, LS, HS, Arc<InProcessEventBus>>>,
    pub latest_state: Arc<LS>,
    pub history: Arc<HS>,
    pub area_service: Arc<AreaService<AR>>,
    pub command_repo: Arc<CR>,
    pub hub_repo: Arc<HR>,
    pub event_store: Arc<ES>,
    pub event_bus: Arc<InProcessEventBus>,
    /// Most recent discovery snapshot, refreshed by the supervisor after
    /// every discovery poll. Not persisted — `/api/devices/discovered`
    /// reflects whatever was seen on the wire, not the registry.
    pub discovered: Arc<RwLock<Vec<DiscoveredDevice>>>,
    pub hub_id: Arc<str>,
    pub hub_name: Arc<str>,
    pub hub_version: Arc<str>,
    pub started_at: Timestamp,
    pub discovery_enabled: bool,
    pub persistence_health: PersistenceHealth,
    /// Number of protocol adapters registered at startup.
    pub adapters_active: usize,
}

impl<DR, ER, AR, LS, HS, CR, HR, ES> Clone for AppState<DR, ER, AR, LS, HS, CR, HR, ES> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            latest_state: Arc::clone(&self.latest_state),
            history: Arc::clone(&self.history),
            area_service: Arc::clone(&self.area_service),
            command_repo: Arc::clone(&self.command_repo),
            hub_repo: Arc::clone(&self.hub_repo),
            event_store: Arc::clone(&self.event_store),
            event_bus: Arc::clone(&self.event_bus),
            discovered: Arc::clone(&self.discovered),
            hub_id: Arc::clone(&self.hub_id),
            hub_name: Arc::clone(&self.hub_name),
            hub_version: Arc::clone(&self.hub_version),
            started_at: self.started_at,
            discovery_enabled: self.discovery_enabled,
            persistence_health: self.persistence_health.clone(),
            adapters_active: self.adapters_active,
        }
    }
}

/// Fields needed to build an [`AppState`] beyond the repositories/services
/// themselves, grouped so the composition root isn't passing a dozen
/// positional arguments.
pub struct AppStateConfig {
    pub hub_id: String,
    pub hub_name: String,
    pub hub_version: String,
    pub started_at: Timestamp,
    pub discovery_enabled: bool,
    pub persistence_health: PersistenceHealth,
    pub adapters_active: usize,
}

impl<DR, ER, AR, LS, HS, CR, HR, ES> AppState<DR, ER, AR, LS, HS, CR, HR, ES>
where
    DR: DeviceRepository + Send + Sync + 'static,
    ER: EntityRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    LS: LatestStateSink + Send + Sync + 'static,
    HS: HistorySink + Send + Sync + 'static,
    CR: CommandRepository + Send + Sync + 'static,
    HR: HubRepository + Send + Sync + 'static,
    ES: EventStore + Send + Sync + 'static,
{
    /// Assemble state from already-constructed components. The registry is
    /// accepted pre-built so the supervisor can keep using the same
    /// instance for both adapter dispatch and HTTP reads.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        registry: Arc<RegistryService<DR, ER, LS, HS, Arc<InProcessEventBus>>>,
        latest_state: Arc<LS>,
        history: Arc<HS>,
        area_service: Arc<AreaService<AR>>,
        command_repo: Arc<CR>,
        hub_repo: Arc<HR>,
        event_store: Arc<ES>,
        event_bus: Arc<InProcessEventBus>,
        config: AppStateConfig,
    ) -> Self {
        Self {
            registry,
            latest_state,
            history,
            area_service,
            command_repo,
            hub_repo,
            event_store,
            event_bus,
            discovered: Arc::new(RwLock::new(Vec::new())),
            hub_id: Arc::from(config.hub_id),
            hub_name: Arc::from(config.hub_name),
            hub_version: Arc::from(config.hub_version),
            started_at: config.started_at,
            discovery_enabled: config.discovery_enabled,
            persistence_health: config.persistence_health,
            adapters_active: config.adapters_active,
        }
    }
}
