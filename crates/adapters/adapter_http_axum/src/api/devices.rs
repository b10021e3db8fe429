//! JSON REST handlers for devices.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use minihub_app::ports::adapter::DiscoveredDevice;
use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};
use minihub_domain::device::Device;
use minihub_domain::id::{AreaId, DeviceId};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListDevicesQuery {
    /// Filter to devices assigned to this room (area).
    #[serde(default)]
    room: Option<AreaId>,
}

/// `GET /api/devices` — every registered device, or those in a given room
/// when `?room=<area-id>` is supplied.
pub async fn list<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Query(query): Query<ListDevicesQuery>,
) -> Result<Json<Vec<Device>>, ApiError>
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
    let devices = match query.room {
        Some(area_id) => state.registry.query_devices_by_room(area_id).await?,
        None => state.registry.list_devices().await?,
    };
    Ok(Json(devices))
}

/// `GET /api/devices/{id}` — a single registered device.
pub async fn get<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Path(id): Path<String>,
) -> Result<Json<Device>, ApiError>
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
    let device_id =
        DeviceId::from_str(&id).map_err(|_| ApiError::bad_request("invalid device id"))?;
    Ok(Json(state.registry.get_device(device_id).await?))
}

/// `GET /api/devices/discovered` — the live, non-persisted discovery
/// snapshot, last refreshed by the supervisor's discovery loop.
pub async fn discovered<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Json<Vec<DiscoveredDevice>>
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
    Json(state.discovered.read().await.clone())
}
