//! Service layer shared by every CRUD resource.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::auth::passwords::PasswordError;
use crate::application::repos::{EntityRepo, RepoError};
use crate::domain::error::DomainError;
use crate::domain::resource::Resource;
use crate::domain::validation::Validate;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Operations the router factory maps HTTP verbs onto.
#[async_trait]
pub trait CrudService<R: Resource>: Send + Sync {
    async fn get_all_objects(&self) -> Result<Vec<R>, ServiceError>;

    async fn create_object(&self, data: R::Create) -> Result<R, ServiceError>;

    async fn get_object_by_id(&self, id: i64) -> Result<Option<R>, ServiceError>;

    async fn update_object(&self, id: i64, data: R::Update) -> Result<Option<R>, ServiceError>;

    async fn delete_object(&self, id: i64) -> Result<bool, ServiceError>;
}

/// Validates payloads and forwards to the repository.
pub struct EntityService<R: Resource> {
    repo: Arc<dyn EntityRepo<R>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Resource> EntityService<R> {
    pub fn new(repo: Arc<dyn EntityRepo<R>>) -> Self {
        Self {
            repo,
            _record: PhantomData,
        }
    }
}

impl<R: Resource> Clone for EntityService<R> {
    fn clone(&self) -> Self {
        Self::new(self.repo.clone())
    }
}

#[async_trait]
impl<R: Resource> CrudService<R> for EntityService<R> {
    async fn get_all_objects(&self) -> Result<Vec<R>, ServiceError> {
        self.repo.list_all().await.map_err(ServiceError::from)
    }

    async fn create_object(&self, data: R::Create) -> Result<R, ServiceError> {
        data.validate()?;
        self.repo.create(data).await.map_err(ServiceError::from)
    }

    async fn get_object_by_id(&self, id: i64) -> Result<Option<R>, ServiceError> {
        self.repo.find_by_id(id).await.map_err(ServiceError::from)
    }

    async fn update_object(&self, id: i64, data: R::Update) -> Result<Option<R>, ServiceError> {
        data.validate()?;
        self.repo.update(id, data).await.map_err(ServiceError::from)
    }

    async fn delete_object(&self, id: i64) -> Result<bool, ServiceError> {
        self.repo.delete(id).await.map_err(ServiceError::from)
    }
}
