//! Registration, login, token refresh and bearer authentication.

pub mod passwords;
pub mod tokens;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::service::{CrudService, ServiceError};
use crate::application::users::UserService;
use crate::domain::entities::{RoleRecord, UserCredentials};
use crate::domain::schemas::NewUser;
use crate::domain::validation::Validate;

use self::tokens::{DecodeFailure, TokenCodec, TokenKind, TokenPair};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Refresh token expired")]
    RefreshTokenExpired,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Invalid token type")]
    WrongTokenType,
    #[error("User inactive or deleted")]
    InactiveUser,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Пользователь с таким логином уже существует")]
    LoginTaken,
    #[error("Данной роли не существует")]
    UnknownRole,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("jwt key material unavailable: {0}")]
    KeyMaterial(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Identity resolved from a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
    pub role_id: i64,
}

impl From<&UserCredentials> for CurrentUser {
    fn from(user: &UserCredentials) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            role_id: user.role_id,
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<UserService>,
    roles: Arc<dyn CrudService<RoleRecord>>,
    tokens: Arc<TokenCodec>,
}

impl AuthService {
    pub fn new(
        users: Arc<UserService>,
        roles: Arc<dyn CrudService<RoleRecord>>,
        tokens: Arc<TokenCodec>,
    ) -> Self {
        Self {
            users,
            roles,
            tokens,
        }
    }

    /// Creates an account and returns its id. The password is hashed by the
    /// user service before it reaches storage.
    pub async fn register(&self, payload: NewUser) -> Result<i64, AuthError> {
        payload.validate().map_err(ServiceError::from)?;

        if self.roles.get_object_by_id(payload.role_id).await?.is_none() {
            return Err(AuthError::UnknownRole);
        }
        if self.users.get_object_by_login(&payload.login).await?.is_some() {
            return Err(AuthError::LoginTaken);
        }

        let user = match self.users.create_object(payload).await {
            Ok(user) => user,
            Err(ServiceError::Repo(err)) if err.duplicate_field() == Some("login") => {
                return Err(AuthError::LoginTaken);
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "medrecords::auth",
            user_id = user.id,
            login = %user.login,
            "user registered"
        );
        Ok(user.id)
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .verify_credentials(login, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.active {
            return Err(AuthError::InactiveUser);
        }
        self.tokens.issue_pair(&user)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.decode(refresh_token).map_err(|failure| match failure {
            DecodeFailure::Expired => AuthError::RefreshTokenExpired,
            DecodeFailure::Invalid => AuthError::InvalidRefreshToken,
        })?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenType);
        }

        let user = self.active_user(&claims.sub).await?;
        self.tokens.issue_pair(&user)
    }

    /// Resolves the bearer of an access token to an active user.
    pub async fn authenticate(&self, access_token: &str) -> Result<CurrentUser, AuthError> {
        let claims = self.tokens.decode(access_token).map_err(|failure| match failure {
            DecodeFailure::Expired => AuthError::TokenExpired,
            DecodeFailure::Invalid => AuthError::InvalidToken,
        })?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenType);
        }

        let user = self.active_user(&claims.sub).await?;
        Ok(CurrentUser::from(&user))
    }

    async fn active_user(&self, login: &str) -> Result<UserCredentials, AuthError> {
        match self.users.get_object_by_login(login).await? {
            Some(user) if user.active => Ok(user),
            _ => Err(AuthError::InactiveUser),
        }
    }
}
