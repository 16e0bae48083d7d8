use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreateUserParams, RepoError, UpdateUserParams, UsersRepo},
    domain::entities::{UserCredentials, UserRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    fio: String,
    login: String,
    active: bool,
    role_id: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            fio: row.fio,
            login: row.login,
            active: row.active,
            role_id: row.role_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: i64,
    login: String,
    password: Vec<u8>,
    active: bool,
    role_id: i64,
}

impl From<CredentialsRow> for UserCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            password_hash: row.password,
            active: row.active,
            role_id: row.role_id,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, fio, login, active, role_id, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, fio, login, active, role_id, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_credentials_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserCredentials>, RepoError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT id, login, password, active, role_id
            FROM users
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserCredentials::from))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (fio, login, password, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, fio, login, active, role_id, created_at, updated_at
            "#,
        )
        .bind(params.fio)
        .bind(params.login)
        .bind(params.password_hash)
        .bind(params.role_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_user(
        &self,
        id: i64,
        params: UpdateUserParams,
    ) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET fio = COALESCE($2, fio),
                login = COALESCE($3, login),
                password = COALESCE($4, password),
                role_id = COALESCE($5, role_id),
                active = COALESCE($6, active),
                updated_at = now()
            WHERE id = $1
            RETURNING id, fio, login, active, role_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(params.fio)
        .bind(params.login)
        .bind(params.password_hash)
        .bind(params.role_id)
        .bind(params.active)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
