//! Document activity over the trailing week.

use std::collections::HashMap;
use std::sync::Arc;

use time::{Date, Duration, OffsetDateTime};

use crate::application::repos::{RepoError, StatisticsRepo};
use crate::domain::entities::DailyCount;

pub const WEEK_DAYS: i64 = 7;

#[derive(Clone)]
pub struct StatisticsService {
    repo: Arc<dyn StatisticsRepo>,
}

impl StatisticsService {
    pub fn new(repo: Arc<dyn StatisticsRepo>) -> Self {
        Self { repo }
    }

    /// Seven rows ending today (UTC), oldest first; pass `author_id` to count
    /// only that user's documents.
    pub async fn weekly_documents(
        &self,
        author_id: Option<i64>,
    ) -> Result<Vec<DailyCount>, RepoError> {
        self.weekly_documents_ending(OffsetDateTime::now_utc().date(), author_id)
            .await
    }

    pub async fn weekly_documents_ending(
        &self,
        today: Date,
        author_id: Option<i64>,
    ) -> Result<Vec<DailyCount>, RepoError> {
        let start = week_start(today);
        let counts = self.repo.daily_document_counts(start, author_id).await?;
        Ok(fill_week(today, &counts))
    }
}

fn week_start(today: Date) -> Date {
    today - Duration::days(WEEK_DAYS - 1)
}

/// Expands sparse per-day counts into a dense week, zero-filling gaps.
pub fn fill_week(today: Date, counts: &[(Date, i64)]) -> Vec<DailyCount> {
    let by_day: HashMap<Date, i64> = counts.iter().copied().collect();
    let start = week_start(today);

    (0..WEEK_DAYS)
        .map(|offset| {
            let day = start + Duration::days(offset);
            DailyCount {
                date: day.to_string(),
                count: by_day.get(&day).copied().unwrap_or(0),
            }
        })
        .collect()
}
