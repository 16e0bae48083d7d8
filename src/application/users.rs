use std::sync::Arc;

use async_trait::async_trait;

use crate::application::auth::passwords::PasswordHasher;
use crate::application::repos::{CreateUserParams, UpdateUserParams, UsersRepo};
use crate::application::service::{CrudService, ServiceError};
use crate::domain::entities::{UserCredentials, UserRecord};
use crate::domain::schemas::{NewUser, UserUpdate};
use crate::domain::validation::Validate;

/// User CRUD plus the lookups authentication needs. Plain-text passwords are
/// hashed here, never stored.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UsersRepo>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    pub async fn get_object_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserCredentials>, ServiceError> {
        self.repo
            .find_credentials_by_login(login)
            .await
            .map_err(ServiceError::from)
    }

    /// Returns the user only when the password matches.
    pub async fn verify_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<UserCredentials>, ServiceError> {
        let Some(user) = self.get_object_by_login(login).await? else {
            return Ok(None);
        };
        let matches = self
            .hasher
            .verify(password.to_string(), user.password_hash.clone())
            .await?;
        Ok(matches.then_some(user))
    }
}

#[async_trait]
impl CrudService<UserRecord> for UserService {
    async fn get_all_objects(&self) -> Result<Vec<UserRecord>, ServiceError> {
        self.repo.list_users().await.map_err(ServiceError::from)
    }

    async fn create_object(&self, data: NewUser) -> Result<UserRecord, ServiceError> {
        data.validate()?;
        let password_hash = self.hasher.hash(data.password).await?;
        self.repo
            .create_user(CreateUserParams {
                fio: data.fio,
                login: data.login,
                password_hash,
                role_id: data.role_id,
            })
            .await
            .map_err(ServiceError::from)
    }

    async fn get_object_by_id(&self, id: i64) -> Result<Option<UserRecord>, ServiceError> {
        self.repo.find_user(id).await.map_err(ServiceError::from)
    }

    async fn update_object(
        &self,
        id: i64,
        data: UserUpdate,
    ) -> Result<Option<UserRecord>, ServiceError> {
        data.validate()?;
        let password_hash = match data.password {
            Some(password) => Some(self.hasher.hash(password).await?),
            None => None,
        };
        self.repo
            .update_user(
                id,
                UpdateUserParams {
                    fio: data.fio,
                    login: data.login,
                    password_hash,
                    role_id: data.role_id,
                    active: data.active,
                },
            )
            .await
            .map_err(ServiceError::from)
    }

    async fn delete_object(&self, id: i64) -> Result<bool, ServiceError> {
        self.repo.delete_user(id).await.map_err(ServiceError::from)
    }
}
