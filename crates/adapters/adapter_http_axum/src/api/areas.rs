//! JSON REST handlers for areas.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};
use minihub_domain::area::Area;
use minihub_domain::id::AreaId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating an area.
#[derive(Deserialize)]
pub struct CreateAreaRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

/// `GET /api/areas`
pub async fn list<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Result<Json<Vec<Area>>, ApiError>
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
    Ok(Json(state.area_service.list_areas().await?))
}

/// `GET /api/areas/{id}`
pub async fn get<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Path(id): Path<String>,
) -> Result<Json<Area>, ApiError>
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
    let area_id = AreaId::from_str(&id).map_err(|_| ApiError::bad_request("invalid area id"))?;
    Ok(Json(state.area_service.get_area(area_id).await?))
}

/// Wraps [`Area`] so a freshly created area is returned with `201`.
pub struct CreatedArea(Area);

impl IntoResponse for CreatedArea {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// `POST /api/areas`
pub async fn create<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Json(req): Json<CreateAreaRequest>,
) -> Result<CreatedArea, ApiError>
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
    let parent_id = req
        .parent_id
        .map(|s| AreaId::from_str(&s))
        .transpose()
        .map_err(|_| ApiError::bad_request("invalid parent area id"))?;

    let mut builder = Area::builder().name(req.name);
    if let Some(parent_id) = parent_id {
        builder = builder.parent_id(parent_id);
    }

    let area = builder.build()?;
    let created = state.area_service.create_area(area).await?;
    Ok(CreatedArea(created))
}

/// `DELETE /api/areas/{id}`
pub async fn delete<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
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
    let area_id = AreaId::from_str(&id).map_err(|_| ApiError::bad_request("invalid area id"))?;
    state.area_service.delete_area(area_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
