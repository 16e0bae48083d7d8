use std::fmt::Display;

use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{FormRejection, JsonRejection, PathRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::application::auth::AuthError;
use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::application::service::ServiceError;
use crate::domain::error::DomainError;
use crate::domain::inflection::{Gender, NounForms};

/// Write being performed when a failure happened; picks the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn failure_prefix(self) -> &'static str {
        match self {
            Action::Create => "Ошибка создания",
            Action::Update => "Ошибка обновления",
            Action::Read | Action::Delete => "Ошибка запроса",
        }
    }
}

/// HTTP failure rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: Value,
    source: &'static str,
    cause: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<Value>) -> Self {
        Self {
            status,
            detail: detail.into(),
            source: "infra::http",
            cause: None,
        }
    }

    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    pub fn with_cause(mut self, cause: impl Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail.into())
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, detail.into())
    }

    /// Field-level validation failure in the `[{loc, msg, type}]` shape.
    pub fn unprocessable(location: &[&str], message: impl Into<String>, kind: &str) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": location, "msg": message.into(), "type": kind }]),
        )
    }

    pub fn internal(cause: impl Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").with_cause(cause)
    }

    pub fn unavailable(cause: impl Display) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        )
        .with_cause(cause)
    }

    /// Maps a service failure for a resource whose messages use `forms`.
    pub fn from_service(err: ServiceError, forms: &NounForms, action: Action) -> Self {
        match err {
            ServiceError::Validation(DomainError::Validation { field, message }) => {
                Self::unprocessable(&["body", field], message, "value_error")
            }
            ServiceError::Repo(err) => Self::from_repo(err, Some(forms), action),
            ServiceError::Password(err) => Self::internal(err),
        }
    }

    pub fn from_repo(err: RepoError, forms: Option<&NounForms>, action: Action) -> Self {
        match err {
            RepoError::NotFound => match forms {
                Some(forms) => Self::not_found(forms.not_found()),
                None => Self::not_found("Not found"),
            },
            RepoError::Duplicate { .. } => {
                let field = err.duplicate_field().unwrap_or("unknown").to_string();
                let subject = forms.map(NounForms::title).unwrap_or_else(|| "Запись".into());
                Self::conflict(format!(
                    "{subject} с таким значением поля '{field}' уже существует"
                ))
                .with_cause(&err)
            }
            RepoError::InvalidInput { ref message } => {
                Self::bad_request(format!("{}: {message}", action.failure_prefix()))
                    .with_cause(&err)
            }
            RepoError::Integrity { ref message } => {
                Self::unprocessable(&["body"], message.clone(), "value_error").with_cause(&err)
            }
            RepoError::Timeout => Self::unavailable(err),
            RepoError::Persistence(_) => Self::internal(err),
        }
        .with_source("infra::http::repo")
    }

    pub fn from_json_rejection(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        let message = rejection.body_text();
        let error = if status == StatusCode::UNPROCESSABLE_ENTITY {
            Self::unprocessable(&["body"], message, "value_error")
        } else {
            Self::new(status, message)
        };
        error.with_source("infra::http::json")
    }

    pub fn from_form_rejection(rejection: FormRejection) -> Self {
        Self::unprocessable(&["body"], rejection.body_text(), "value_error")
            .with_source("infra::http::form")
    }

    pub fn from_path_rejection(rejection: PathRejection) -> Self {
        Self::unprocessable(&["path"], rejection.body_text(), "int_parsing")
            .with_source("infra::http::path")
    }

    pub fn from_multipart(err: MultipartError) -> Self {
        let status = err.status();
        let detail = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "Файл превышает допустимый размер".to_string()
        } else {
            "Некорректные данные формы".to_string()
        };
        Self::new(status, detail)
            .with_cause(err.body_text())
            .with_source("infra::http::multipart")
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let error = match err {
            AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::RefreshTokenExpired
            | AuthError::InvalidRefreshToken
            | AuthError::WrongTokenType
            | AuthError::InactiveUser
            | AuthError::InvalidCredentials => Self::unauthorized(err.to_string()),
            AuthError::LoginTaken => Self::conflict(err.to_string()),
            AuthError::UnknownRole => Self::not_found(err.to_string()),
            AuthError::Signing(_) | AuthError::KeyMaterial(_) => Self::internal(&err),
            AuthError::Service(inner) => {
                let forms = NounForms::new("пользователь", Gender::Masculine);
                Self::from_service(inner, &forms, Action::Create)
            }
        };
        error.with_source("infra::http::auth")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match (&self.cause, &self.detail) {
            (Some(cause), _) => cause.clone(),
            (None, Value::String(detail)) => detail.clone(),
            (None, detail) => detail.to_string(),
        };
        let mut response = (self.status, Json(json!({ "detail": self.detail }))).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        ErrorReport::from_message(self.source, self.status, message).attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_forms() -> NounForms {
        NounForms::new("пациент", Gender::Masculine)
    }

    #[test]
    fn duplicate_names_the_field() {
        let err = ApiError::from_repo(
            RepoError::Duplicate {
                constraint: "patients_fio_key".to_string(),
            },
            Some(&patient_forms()),
            Action::Create,
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(
            err.detail(),
            &json!("Пациент с таким значением поля 'fio' уже существует")
        );
    }

    #[test]
    fn missing_foreign_key_is_a_bad_request() {
        let err = ApiError::from_repo(
            RepoError::InvalidInput {
                message: "violates foreign key constraint".to_string(),
            },
            None,
            Action::Update,
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.detail(),
            &json!("Ошибка обновления: violates foreign key constraint")
        );
    }

    #[test]
    fn validation_failure_points_at_field() {
        let err = ApiError::from_service(
            ServiceError::Validation(DomainError::validation("age", "must be at most 150")),
            &patient_forms(),
            Action::Create,
        );
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.detail()[0]["loc"], json!(["body", "age"]));
    }

    #[test]
    fn unauthorized_carries_challenge_and_report() {
        let response = ApiError::from(AuthError::TokenExpired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Bearer"))
        );
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(report.messages, vec!["Token expired".to_string()]);
    }

    #[test]
    fn timeouts_are_service_unavailable() {
        let err = ApiError::from_repo(RepoError::Timeout, None, Action::Read);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
