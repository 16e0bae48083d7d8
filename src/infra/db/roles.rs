use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{EntityRepo, RepoError},
    domain::{
        entities::RoleRecord,
        schemas::{NewRole, RoleUpdate},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<RoleRow> for RoleRecord {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl EntityRepo<RoleRecord> for PostgresRepositories {
    async fn list_all(&self) -> Result<Vec<RoleRecord>, RepoError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM roles
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(RoleRecord::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RoleRecord>, RepoError> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RoleRecord::from))
    }

    async fn create(&self, params: NewRole) -> Result<RoleRecord, RepoError> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(params.name)
        .bind(params.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, changes: RoleUpdate) -> Result<Option<RoleRecord>, RepoError> {
        let description_given = changes.description.is_some();
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(description_given)
        .bind(changes.description.flatten())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RoleRecord::from))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
