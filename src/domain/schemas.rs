//! Inbound payloads for creating and partially updating entities.
//!
//! Update schemas carry `Option` fields: `None` keeps the stored value.
//! Nullable columns use `Option<Option<T>>` so that an explicit `null`
//! clears the column while an absent key leaves it alone.

use serde::{Deserialize, Deserializer};

use crate::domain::error::DomainError;
use crate::domain::types::DocumentCategory;
use crate::domain::validation::{
    Validate, ensure_length, ensure_optional_length, ensure_positive_id, ensure_range,
};

const FIO_MIN: usize = 3;
const FIO_MAX: usize = 255;
const LOGIN_MIN: usize = 3;
const LOGIN_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 64;
const ROLE_NAME_MIN: usize = 3;
const ROLE_NAME_MAX: usize = 255;
const ROLE_DESCRIPTION_MAX: usize = 1000;
const PATIENT_FIO_MIN: usize = 10;
const PATIENT_FIO_MAX: usize = 255;
const PATIENT_AGE_MAX: i64 = 150;
const DOCUMENT_NAME_MIN: usize = 3;
const DOCUMENT_NAME_MAX: usize = 255;

/// Also the registration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub fio: String,
    pub login: String,
    pub password: String,
    pub role_id: i64,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_length("fio", &self.fio, FIO_MIN, FIO_MAX)?;
        ensure_length("login", &self.login, LOGIN_MIN, LOGIN_MAX)?;
        ensure_length("password", &self.password, PASSWORD_MIN, PASSWORD_MAX)?;
        ensure_positive_id("role_id", self.role_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub fio: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<i64>,
    pub active: Option<bool>,
}

impl Validate for UserUpdate {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_optional_length("fio", self.fio.as_deref(), FIO_MIN, FIO_MAX)?;
        ensure_optional_length("login", self.login.as_deref(), LOGIN_MIN, LOGIN_MAX)?;
        ensure_optional_length(
            "password",
            self.password.as_deref(),
            PASSWORD_MIN,
            PASSWORD_MAX,
        )?;
        if let Some(role_id) = self.role_id {
            ensure_positive_id("role_id", role_id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for NewRole {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_length("name", &self.name, ROLE_NAME_MIN, ROLE_NAME_MAX)?;
        ensure_optional_length(
            "description",
            self.description.as_deref(),
            0,
            ROLE_DESCRIPTION_MAX,
        )
    }
}

/// Maps a present key to `Some`, whatever its value; serde's `default`
/// covers the absent case.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
}

impl Validate for RoleUpdate {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_optional_length("name", self.name.as_deref(), ROLE_NAME_MIN, ROLE_NAME_MAX)?;
        ensure_optional_length(
            "description",
            self.description.as_ref().and_then(Option::as_deref),
            0,
            ROLE_DESCRIPTION_MAX,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub fio: String,
    pub age: i32,
}

impl Validate for NewPatient {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_length("fio", &self.fio, PATIENT_FIO_MIN, PATIENT_FIO_MAX)?;
        ensure_range("age", self.age.into(), 0, PATIENT_AGE_MAX)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub fio: Option<String>,
    pub age: Option<i32>,
}

impl Validate for PatientUpdate {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_optional_length("fio", self.fio.as_deref(), PATIENT_FIO_MIN, PATIENT_FIO_MAX)?;
        if let Some(age) = self.age {
            ensure_range("age", age.into(), 0, PATIENT_AGE_MAX)?;
        }
        Ok(())
    }
}

/// `data` is never read from JSON; the uploaded file is attached server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub subdirectory_type: DocumentCategory,
    pub patient_id: i64,
    #[serde(default)]
    pub author_id: Option<i64>,
}

impl Validate for NewDocument {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_length("name", &self.name, DOCUMENT_NAME_MIN, DOCUMENT_NAME_MAX)?;
        ensure_positive_id("patient_id", self.patient_id)?;
        if let Some(author_id) = self.author_id {
            ensure_positive_id("author_id", author_id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub name: Option<String>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub subdirectory_type: Option<DocumentCategory>,
    pub patient_id: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    pub author_id: Option<Option<i64>>,
}

impl Validate for DocumentUpdate {
    fn validate(&self) -> Result<(), DomainError> {
        ensure_optional_length(
            "name",
            self.name.as_deref(),
            DOCUMENT_NAME_MIN,
            DOCUMENT_NAME_MAX,
        )?;
        if let Some(patient_id) = self.patient_id {
            ensure_positive_id("patient_id", patient_id)?;
        }
        if let Some(Some(author_id)) = self.author_id {
            ensure_positive_id("author_id", author_id)?;
        }
        Ok(())
    }
}
