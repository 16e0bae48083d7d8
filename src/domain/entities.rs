//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::DocumentCategory;

/// Public view of a user; the password hash never leaves the credentials record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub fio: String,
    pub login: String,
    pub active: bool,
    pub role_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// What the authentication flow needs to verify a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCredentials {
    pub id: i64,
    pub login: String,
    pub password_hash: Vec<u8>,
    pub active: bool,
    pub role_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    pub fio: String,
    pub age: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub subdirectory_type: DocumentCategory,
    pub patient_id: i64,
    pub author_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Documents created on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

pub(crate) mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn document_payload_is_base64_in_json() {
        let record = DocumentRecord {
            id: 3,
            name: "scan.pdf".to_string(),
            data: b"%PDF".to_vec(),
            subdirectory_type: DocumentCategory::Diagnostics,
            patient_id: 1,
            author_id: None,
            created_at: datetime!(2024-03-01 10:00 UTC),
            updated_at: datetime!(2024-03-01 10:00 UTC),
        };

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["data"], "JVBERg==");
        assert_eq!(value["subdirectory_type"], "Диагностика");
        assert_eq!(value["created_at"], "2024-03-01T10:00:00Z");

        let back: DocumentRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }
}
