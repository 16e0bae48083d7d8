use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{EntityRepo, RepoError},
    domain::{
        entities::PatientRecord,
        schemas::{NewPatient, PatientUpdate},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PatientRow {
    id: i64,
    fio: String,
    age: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PatientRow> for PatientRecord {
    fn from(row: PatientRow) -> Self {
        Self {
            id: row.id,
            fio: row.fio,
            age: row.age,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl EntityRepo<PatientRecord> for PostgresRepositories {
    async fn list_all(&self) -> Result<Vec<PatientRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT id, fio, age, created_at, updated_at
            FROM patients
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PatientRecord::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PatientRecord>, RepoError> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT id, fio, age, created_at, updated_at
            FROM patients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PatientRecord::from))
    }

    async fn create(&self, params: NewPatient) -> Result<PatientRecord, RepoError> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            INSERT INTO patients (fio, age)
            VALUES ($1, $2)
            RETURNING id, fio, age, created_at, updated_at
            "#,
        )
        .bind(params.fio)
        .bind(params.age)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update(
        &self,
        id: i64,
        changes: PatientUpdate,
    ) -> Result<Option<PatientRecord>, RepoError> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            UPDATE patients
            SET fio = COALESCE($2, fio),
                age = COALESCE($3, age),
                updated_at = now()
            WHERE id = $1
            RETURNING id, fio, age, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.fio)
        .bind(changes.age)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PatientRecord::from))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
