//! Repository traits describing persistence adapters.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::Date;

use crate::domain::entities::{UserCredentials, UserRecord};
use crate::domain::resource::Resource;
use crate::domain::types::DocumentCategory;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Column guarded by a `<table>_<column>_key` unique constraint.
    pub fn duplicate_field(&self) -> Option<&str> {
        match self {
            RepoError::Duplicate { constraint } => {
                let trimmed = constraint.strip_suffix("_key").unwrap_or(constraint);
                Some(
                    trimmed
                        .split_once('_')
                        .map(|(_, field)| field)
                        .unwrap_or(trimmed),
                )
            }
            _ => None,
        }
    }
}

/// Plain CRUD over one table. `update` applies only the fields present in the
/// payload and returns `None` when the row does not exist.
#[async_trait]
pub trait EntityRepo<R: Resource>: Send + Sync {
    async fn list_all(&self) -> Result<Vec<R>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<R>, RepoError>;

    async fn create(&self, params: R::Create) -> Result<R, RepoError>;

    async fn update(&self, id: i64, changes: R::Update) -> Result<Option<R>, RepoError>;

    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub fio: String,
    pub login: String,
    pub password_hash: Vec<u8>,
    pub role_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserParams {
    pub fio: Option<String>,
    pub login: Option<String>,
    pub password_hash: Option<Vec<u8>>,
    pub role_id: Option<i64>,
    pub active: Option<bool>,
}

/// Users carry a password hash, so their writes take hashed params rather
/// than the inbound schema.
#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError>;

    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError>;

    async fn find_credentials_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserCredentials>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn update_user(
        &self,
        id: i64,
        params: UpdateUserParams,
    ) -> Result<Option<UserRecord>, RepoError>;

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError>;
}

/// Aggregates recomputed by the metrics job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservabilitySnapshot {
    pub active_connections: i64,
    pub active_users: i64,
    pub documents_total: i64,
    pub documents_by_category: Vec<(DocumentCategory, i64)>,
    pub users_by_role: Vec<(String, i64)>,
    pub patient_ages: Vec<i32>,
    pub new_patients_last_hour: i64,
}

#[async_trait]
pub trait StatisticsRepo: Send + Sync {
    /// Round-trips a trivial statement and reports how long it took.
    async fn ping(&self) -> Result<Duration, RepoError>;

    async fn observability_snapshot(&self) -> Result<ObservabilitySnapshot, RepoError>;

    /// Documents per UTC creation day from `since` onwards, days without
    /// documents omitted.
    async fn daily_document_counts(
        &self,
        since: Date,
        author_id: Option<i64>,
    ) -> Result<Vec<(Date, i64)>, RepoError>;
}
