//! Registration and token endpoints.

use axum::{
    Form, Json, Router,
    extract::{
        State,
        rejection::{FormRejection, JsonRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::schemas::NewUser;

use super::error::ApiError;
use super::resource::{OperationDoc, ResponseDoc};
use super::resources::USERS;
use super::state::AppState;

const TAGS: &[&str] = &["Аутентификация"];

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshForm {
    pub refresh_token: String,
}

pub fn router(api_prefix: &str) -> (Router<AppState>, Vec<OperationDoc>) {
    let register_path = format!("{api_prefix}/auth/register");
    let login_path = format!("{api_prefix}/auth/login");
    let refresh_path = format!("{api_prefix}/auth/refresh");

    let docs = vec![
        OperationDoc {
            method: "POST",
            path: register_path.clone(),
            tags: TAGS.to_vec(),
            description: "Регистрация нового пользователя.".to_string(),
            responses: vec![
                ResponseDoc::new(StatusCode::CREATED, "Пользователь создан"),
                ResponseDoc::new(StatusCode::NOT_FOUND, "Данной роли не существует"),
                ResponseDoc::new(
                    StatusCode::CONFLICT,
                    "Пользователь с таким логином уже существует",
                ),
            ],
        },
        OperationDoc {
            method: "POST",
            path: login_path.clone(),
            tags: TAGS.to_vec(),
            description: "Получение пары токенов по логину и паролю.".to_string(),
            responses: vec![
                ResponseDoc::new(StatusCode::OK, "Пара токенов"),
                ResponseDoc::new(StatusCode::UNAUTHORIZED, "Invalid credentials"),
            ],
        },
        OperationDoc {
            method: "POST",
            path: refresh_path.clone(),
            tags: TAGS.to_vec(),
            description: "Обновление пары токенов по refresh-токену.".to_string(),
            responses: vec![
                ResponseDoc::new(StatusCode::OK, "Пара токенов"),
                ResponseDoc::new(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
            ],
        },
    ];

    let router = Router::new()
        .route(&register_path, post(register))
        .route(&login_path, post(login))
        .route(&refresh_path, post(refresh));

    (router, docs)
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(ApiError::from_json_rejection)?;
    let id = state.auth.register(payload).await?;
    state.cache.invalidate(&[USERS]).await;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(ApiError::from_form_rejection)?;
    let pair = state.auth.login(&form.username, &form.password).await?;
    Ok(Json(pair).into_response())
}

async fn refresh(
    State(state): State<AppState>,
    form: Result<Form<RefreshForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(ApiError::from_form_rejection)?;
    let pair = state.auth.refresh(&form.refresh_token).await?;
    Ok(Json(pair).into_response())
}
