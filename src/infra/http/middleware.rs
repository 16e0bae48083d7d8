use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{Label, counter, histogram};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::auth::CurrentUser;
use crate::application::error::ErrorReport;

use super::error::ApiError;
use super::state::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_ERRORS_TOTAL: &str = "http_errors_total";
pub const API_RESPONSE_TIME_SECONDS: &str = "api_response_time_seconds";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let user_id = response
            .extensions()
            .get::<CurrentUser>()
            .map(|user| user.id.to_string())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "medrecords::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id,
                "request failed",
            );
        } else {
            warn!(
                target = "medrecords::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id,
                "client request error",
            );
        }
    }

    response
}

/// Counts and times every routed request, labelled by route template.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let status_code = status.as_u16().to_string();

    let labels = vec![
        Label::new("method", method),
        Label::new("endpoint", endpoint),
        Label::new("status_code", status_code),
    ];
    counter!(HTTP_REQUESTS_TOTAL, labels.clone()).increment(1);
    if status.is_client_error() || status.is_server_error() {
        counter!(HTTP_ERRORS_TOTAL, labels.clone()).increment(1);
    }
    histogram!(API_RESPONSE_TIME_SECONDS, labels).record(start.elapsed().as_secs_f64());

    response
}

/// Rejects requests without a valid access token for an active user.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return ApiError::unauthorized("Not authenticated")
            .with_source("infra::http::auth_gate")
            .into_response();
    };

    let user = match state.auth.authenticate(&token).await {
        Ok(user) => user,
        Err(err) => return ApiError::from(err).into_response(),
    };

    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

fn bearer_token(request: &Request<Body>) -> Option<String> {
    let raw = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
