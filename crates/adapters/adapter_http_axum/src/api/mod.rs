//! JSON REST API handler modules, nested under `/api` by [`routes`].

#[allow(clippy::missing_errors_doc)]
pub mod areas;
#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod entities;
pub mod hub;

use axum::Router;
use axum::routing::get;

use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};

use crate::state::AppState;

/// Build the `/api` sub-router. Hub introspection and the discovery snapshot
/// and event socket live outside this, at the top level — see
/// [`crate::router::build`].
pub fn routes<DR, ER, AR, LS, HS, CR, HR, ES>()
-> Router<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>
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
        .route(
            "/entities",
            get(entities::list::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/entities/{id}",
            get(entities::get::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/entities/{id}/history",
            get(entities::history::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/entities/{id}/commands",
            axum::routing::post(entities::issue_command::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/devices",
            get(devices::list::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/areas",
            get(areas::list::<DR, ER, AR, LS, HS, CR, HR, ES>)
                .post(areas::create::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
        .route(
            "/areas/{id}",
            get(areas::get::<DR, ER, AR, LS, HS, CR, HR, ES>)
                .delete(areas::delete::<DR, ER, AR, LS, HS, CR, HR, ES>),
        )
}
