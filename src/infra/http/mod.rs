//! HTTP surface: resource routers, auth endpoints, statistics and metrics.

mod auth;
mod error;
mod metrics;
mod middleware;
mod resource;
mod resources;
mod state;
mod statistics;

pub use error::{Action, ApiError};
pub use middleware::{
    API_RESPONSE_TIME_SECONDS, HTTP_ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, RequestContext,
};
pub use resource::{FileField, OperationDoc, ResourceConfig, ResponseDoc, create_base_router};
pub use resources::{DOCUMENTS, PATIENTS, ROLES, USERS};
pub use state::AppState;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};

/// Assembles every route. Resource and statistics routes sit behind the
/// bearer-token gate; docs, auth and metrics stay public.
pub fn build_router(state: AppState) -> Router {
    let api_prefix = state.api_prefix.clone();
    let mut docs: Vec<OperationDoc> = Vec::new();

    let (users, users_docs) = create_base_router(resources::users(), &api_prefix);
    let (roles, roles_docs) = create_base_router(resources::roles(), &api_prefix);
    let (patients, patients_docs) = create_base_router(resources::patients(), &api_prefix);
    let (documents, documents_docs) = create_base_router(resources::documents(), &api_prefix);
    let (statistics, statistics_docs) = statistics::router(&api_prefix);
    let (auth, auth_docs) = auth::router(&api_prefix);

    for group in [
        auth_docs,
        users_docs,
        roles_docs,
        patients_docs,
        documents_docs,
        statistics_docs,
    ] {
        docs.extend(group);
    }
    let docs = Arc::new(docs);

    let protected = Router::new()
        .merge(users)
        .merge(roles)
        .merge(patients)
        .merge(documents)
        .merge(statistics)
        .route_layer(from_fn_with_state(state.clone(), middleware::require_user));

    let public = Router::new()
        .merge(auth)
        .route(
            &format!("{api_prefix}/docs"),
            get(move || {
                let docs = docs.clone();
                async move { Json(docs.as_ref().clone()) }
            }),
        )
        .route("/metrics", get(metrics::render));

    Router::new()
        .merge(public)
        .merge(protected)
        .route_layer(from_fn(middleware::track_metrics))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
        .with_state(state)
}
