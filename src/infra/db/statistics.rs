use std::time::{Duration, Instant};

use async_trait::async_trait;
use time::Date;

use crate::{
    application::repos::{ObservabilitySnapshot, RepoError, StatisticsRepo},
    domain::types::DocumentCategory,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DailyCountRow {
    day: Date,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct CategoryCountRow {
    subdirectory_type: DocumentCategory,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct RoleCountRow {
    name: String,
    count: i64,
}

impl PostgresRepositories {
    async fn scalar_count(&self, sql: &str) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl StatisticsRepo for PostgresRepositories {
    async fn ping(&self) -> Result<Duration, RepoError> {
        let started = Instant::now();
        self.health_check().await.map_err(map_sqlx_error)?;
        Ok(started.elapsed())
    }

    async fn observability_snapshot(&self) -> Result<ObservabilitySnapshot, RepoError> {
        let active_users = self
            .scalar_count("SELECT COUNT(*) FROM users WHERE active")
            .await?;
        let documents_total = self.scalar_count("SELECT COUNT(*) FROM documents").await?;
        let new_patients_last_hour = self
            .scalar_count("SELECT COUNT(*) FROM patients WHERE created_at >= now() - INTERVAL '1 hour'")
            .await?;

        let documents_by_category = sqlx::query_as::<_, CategoryCountRow>(
            r#"
            SELECT subdirectory_type, COUNT(*) AS count
            FROM documents
            GROUP BY subdirectory_type
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| (row.subdirectory_type, row.count))
        .collect();

        let users_by_role = sqlx::query_as::<_, RoleCountRow>(
            r#"
            SELECT r.name, COUNT(u.id) AS count
            FROM roles r
            LEFT JOIN users u ON u.role_id = r.id
            GROUP BY r.id, r.name
            ORDER BY r.id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| (row.name, row.count))
        .collect();

        let patient_ages = sqlx::query_scalar::<_, i32>("SELECT age FROM patients")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ObservabilitySnapshot {
            active_connections: self.active_connections(),
            active_users,
            documents_total,
            documents_by_category,
            users_by_role,
            patient_ages,
            new_patients_last_hour,
        })
    }

    async fn daily_document_counts(
        &self,
        since: Date,
        author_id: Option<i64>,
    ) -> Result<Vec<(Date, i64)>, RepoError> {
        let rows = sqlx::query_as::<_, DailyCountRow>(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count
            FROM documents
            WHERE (created_at AT TIME ZONE 'UTC')::date >= $1
              AND ($2::BIGINT IS NULL OR author_id = $2)
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(since)
        .bind(author_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|row| (row.day, row.count)).collect())
    }
}
