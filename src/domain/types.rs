//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

/// Folder a document is filed under (mirrors Postgres enum `document_category`).
///
/// The wire form is the Russian label shown to clinicians; the snake case
/// identifier is accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "document_category", rename_all = "snake_case")]
pub enum DocumentCategory {
    #[serde(rename = "Диагностика", alias = "diagnostics")]
    Diagnostics,
    #[serde(rename = "Анамнез", alias = "anamnesis")]
    Anamnesis,
    #[serde(rename = "План работы", alias = "work_plan")]
    WorkPlan,
    #[serde(rename = "Комментарии специалистов", alias = "specialist_comments")]
    SpecialistComments,
    #[serde(rename = "Фотографии и Видео", alias = "photos_and_videos")]
    PhotosAndVideos,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 5] = [
        DocumentCategory::Diagnostics,
        DocumentCategory::Anamnesis,
        DocumentCategory::WorkPlan,
        DocumentCategory::SpecialistComments,
        DocumentCategory::PhotosAndVideos,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentCategory::Diagnostics => "diagnostics",
            DocumentCategory::Anamnesis => "anamnesis",
            DocumentCategory::WorkPlan => "work_plan",
            DocumentCategory::SpecialistComments => "specialist_comments",
            DocumentCategory::PhotosAndVideos => "photos_and_videos",
        }
    }
}
