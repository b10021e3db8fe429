//! Axum router assembly.

use axum::Router;
use axum::routing::get;

use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// `/`, `/health`, `/info`, `/api/hub/status`, `/api/devices/discovered` and
/// `/events` are the external surface; everything nested under `/api`
/// besides those is the local management CRUD.
pub fn build<DR, ER, AR, LS, HS, CR, HR, ES>(
    state: AppState<DR, ER, AR, LS, HS, CR, HR, ES>,
) -> Router
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
    Router::new()
        .route("/", get(crate::api::hub::root))
        .route("/health", get(crate::api::hub::health))
        .route("/info", get(crate::api::hub::info))
        .route("/api/hub/status", get(crate::api::hub::status))
        .route(
            "/api/devices/discovered",
            get(crate::api::devices::discovered),
        )
        .route("/events", get(crate::ws::upgrade))
        .nest("/api", crate::api::routes())
        .with_state(state)
}
