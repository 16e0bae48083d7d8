use axum::{
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use super::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Prometheus text exposition of every registered metric.
pub async fn render(State(state): State<AppState>) -> Response {
    let Some(handle) = state.metrics.as_ref() else {
        return ApiError::not_found("Not Found")
            .with_source("infra::http::metrics")
            .into_response();
    };

    let mut response = handle.render().into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
    );
    response
}
