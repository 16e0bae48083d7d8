use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{EntityRepo, RepoError},
    domain::{
        entities::DocumentRecord,
        schemas::{DocumentUpdate, NewDocument},
        types::DocumentCategory,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const DOCUMENT_COLUMNS: &str =
    "id, name, data, subdirectory_type, patient_id, author_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    name: String,
    data: Vec<u8>,
    subdirectory_type: DocumentCategory,
    patient_id: i64,
    author_id: Option<i64>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            data: row.data,
            subdirectory_type: row.subdirectory_type,
            patient_id: row.patient_id,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl EntityRepo<DocumentRecord> for PostgresRepositories {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>, RepoError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id");
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DocumentRecord>, RepoError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(DocumentRecord::from))
    }

    async fn create(&self, params: NewDocument) -> Result<DocumentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO documents (name, data, subdirectory_type, patient_id, author_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(params.name)
            .bind(params.data)
            .bind(params.subdirectory_type)
            .bind(params.patient_id)
            .bind(params.author_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update(
        &self,
        id: i64,
        changes: DocumentUpdate,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let author_given = changes.author_id.is_some();
        let sql = format!(
            "UPDATE documents \
             SET name = COALESCE($2, name), \
                 data = COALESCE($3, data), \
                 subdirectory_type = COALESCE($4, subdirectory_type), \
                 patient_id = COALESCE($5, patient_id), \
                 author_id = CASE WHEN $6 THEN $7 ELSE author_id END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.data)
            .bind(changes.subdirectory_type)
            .bind(changes.patient_id)
            .bind(author_given)
            .bind(changes.author_id.flatten())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(DocumentRecord::from))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
