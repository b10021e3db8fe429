//! JSON REST handlers for entities, their latest state, and history.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};
use minihub_domain::command::{CapabilityTag, Command};
use minihub_domain::entity::{Entity, EntityKind, EntityState};
use minihub_domain::entity_state_history::EntityStateHistory;
use minihub_domain::id::{AreaId, DeviceId, EntityId};
use minihub_domain::time::now;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct EntityView {
    #[serde(flatten)]
    entity: Entity,
    state: Option<EntityState>,
}

#[derive(Deserialize)]
pub struct ListEntitiesQuery {
    #[serde(default)]
    kind: Option<EntityKind>,
    #[serde(default)]
    room: Option<AreaId>,
}

/// `GET /api/entities` — every active entity, with its latest known state.
/// Narrow the result with `?kind=<entity-kind>` and/or `?room=<area-id>`.
pub async fn list<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Query(query): Query<ListEntitiesQuery>,
) -> Result<Json<Vec<EntityView>>, ApiError>
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
    let entities = match (query.kind, query.room) {
        (Some(kind), _) => state.registry.query_by_kind(kind).await?,
        (None, Some(area_id)) => state.registry.query_by_room(area_id).await?,
        (None, None) => state.registry.query_by_home().await?,
    };
    let mut views = Vec::with_capacity(entities.len());
    for entity in entities {
        let current = state.latest_state.get(entity.id).await?;
        views.push(EntityView {
            entity,
            state: current,
        });
    }
    Ok(Json(views))
}

/// `GET /api/entities/{id}` — a single entity with its latest state.
pub async fn get<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Path(id): Path<String>,
) -> Result<Json<EntityView>, ApiError>
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
    let entity_id =
        EntityId::from_str(&id).map_err(|_| ApiError::bad_request("invalid entity id"))?;
    let entity = state.registry.get_entity(entity_id).await?;
    let current = state.latest_state.get(entity.id).await?;
    Ok(Json(EntityView {
        entity,
        state: current,
    }))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
}

const DEFAULT_HISTORY_LIMIT: usize = 100;

/// `GET /api/entities/{id}/history` — recorded state history for an entity.
pub async fn history<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<EntityStateHistory>>, ApiError>
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
    let entity_id =
        EntityId::from_str(&id).map_err(|_| ApiError::bad_request("invalid entity id"))?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let records = state.history.find_by_entity(entity_id, limit).await?;
    Ok(Json(records))
}

#[derive(Deserialize)]
pub struct IssueCommandRequest {
    pub device_id: String,
    pub capability: CapabilityTag,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Wraps [`Command`] so a freshly enqueued command is returned with `201`.
pub struct CreatedCommand(Command);

impl IntoResponse for CreatedCommand {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// `POST /api/entities/{id}/commands` — enqueue a command for the command
/// consumer to dispatch. Clients poll `GET /api/entities/{id}` or subscribe
/// over `/events` for the eventual result.
pub async fn issue_command<DR, ER, AR, LS, HS, CR, HR, ES>(
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
    Path(id): Path<String>,
    Json(req): Json<IssueCommandRequest>,
) -> Result<CreatedCommand, ApiError>
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
    let entity_id =
        EntityId::from_str(&id).map_err(|_| ApiError::bad_request("invalid entity id"))?;
    let device_id = DeviceId::from_str(&req.device_id)
        .map_err(|_| ApiError::bad_request("invalid device id"))?;

    let command = Command::builder()
        .device_id(device_id)
        .entity_id(entity_id)
        .capability(req.capability)
        .value(req.value)
        .created_at(now())
        .build()?;

    let queued = state.command_repo.enqueue(command).await?;
    Ok(CreatedCommand(queued))
}
