//! `/`, `/health`, `/info`, `/api/hub/status` — hub-level introspection.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};
use minihub_domain::time::now;

use crate::state::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    name: String,
    version: String,
    status: &'static str,
}

/// `GET /` — hub name, version, and coarse status.
pub async fn root<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Json<RootResponse>
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
    Json(RootResponse {
        name: state.hub_name.to_string(),
        version: state.hub_version.to_string(),
        status: "running",
    })
}

#[derive(Serialize)]
struct ComponentHealth {
    status: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    uptime_s: i64,
    components: HealthComponents,
    counters: HealthCounters,
}

#[derive(Serialize)]
struct HealthComponents {
    event_bus: ComponentHealth,
    storage: ComponentHealth,
}

#[derive(Serialize)]
struct HealthCounters {
    devices: usize,
    entities: usize,
}

/// `GET /health` — overall status tag, per-component health, and a few
/// headline counters. Never fails: storage errors degrade the counters to
/// zero rather than turning the health check itself into a 500.
pub async fn health<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Json<HealthResponse>
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
    let devices = state.registry.list_devices().await.unwrap_or_default();
    let entities = state.registry.list_entities().await.unwrap_or_default();
    let storage_ok = state.registry.list_devices().await.is_ok();

    let status = if storage_ok { "healthy" } else { "unhealthy" };

    Json(HealthResponse {
        status,
        uptime_s: (now() - state.started_at).num_seconds(),
        components: HealthComponents {
            event_bus: ComponentHealth { status: "healthy" },
            storage: ComponentHealth {
                status: if storage_ok { "healthy" } else { "unhealthy" },
            },
        },
        counters: HealthCounters {
            devices: devices.len(),
            entities: entities.len(),
        },
    })
}

#[derive(Serialize)]
pub struct InfoResponse {
    platform: &'static str,
    arch: &'static str,
    hostname: String,
    uptime_s: i64,
}

/// `GET /info` — platform/arch/hostname/uptime.
pub async fn info<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Json<InfoResponse>
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
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "minihub".to_string());

    Json(InfoResponse {
        platform: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        hostname,
        uptime_s: (now() - state.started_at).num_seconds(),
    })
}

#[derive(Serialize)]
pub struct HubStatusResponse {
    hub_id: String,
    discovery_enabled: bool,
    uptime_s: i64,
}

/// `GET /api/hub/status` — hub id, whether discovery is enabled, uptime.
pub async fn status<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Json<HubStatusResponse>
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
    Json(HubStatusResponse {
        hub_id: state.hub_id.to_string(),
        discovery_enabled: state.discovery_enabled,
        uptime_s: (now() - state.started_at).num_seconds(),
    })
}
