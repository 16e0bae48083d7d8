//! Weekly document activity.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use super::error::{Action, ApiError};
use super::resource::{OperationDoc, ResponseDoc};
use super::state::AppState;

const TAGS: &[&str] = &["Статистика"];

pub fn router(api_prefix: &str) -> (Router<AppState>, Vec<OperationDoc>) {
    let weekly_path = format!("{api_prefix}/statistics/documents/weekly");
    let by_user_path = format!("{weekly_path}/user/{{user_id}}");

    let docs = vec![
        OperationDoc {
            method: "GET",
            path: weekly_path.clone(),
            tags: TAGS.to_vec(),
            description: "Количество документов по дням за последнюю неделю.".to_string(),
            responses: vec![ResponseDoc::new(StatusCode::OK, "Семь дней, от старых к новым")],
        },
        OperationDoc {
            method: "GET",
            path: by_user_path.clone(),
            tags: TAGS.to_vec(),
            description: "Количество документов пользователя по дням за последнюю неделю."
                .to_string(),
            responses: vec![ResponseDoc::new(StatusCode::OK, "Семь дней, от старых к новым")],
        },
    ];

    let router = Router::new()
        .route(&weekly_path, get(weekly_documents))
        .route(&by_user_path, get(weekly_documents_by_user));

    (router, docs)
}

async fn weekly_documents(State(state): State<AppState>) -> Result<Response, ApiError> {
    let week = state
        .statistics
        .weekly_documents(None)
        .await
        .map_err(|err| ApiError::from_repo(err, None, Action::Read))?;
    Ok(Json(week).into_response())
}

async fn weekly_documents_by_user(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(user_id) = user_id.map_err(ApiError::from_path_rejection)?;
    let week = state
        .statistics
        .weekly_documents(Some(user_id))
        .await
        .map_err(|err| ApiError::from_repo(err, None, Action::Read))?;
    Ok(Json(week).into_response())
}
