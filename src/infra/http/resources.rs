//! Resource table: one router configuration per entity.

use std::sync::Arc;

use crate::application::service::CrudService;
use crate::domain::entities::{DocumentRecord, PatientRecord, RoleRecord, UserRecord};
use crate::domain::inflection::Gender;
use crate::domain::schemas::{DocumentUpdate, NewDocument};

use super::resource::{FileField, ResourceConfig};
use super::state::AppState;

pub const USERS: &str = "users";
pub const ROLES: &str = "roles";
pub const PATIENTS: &str = "patients";
pub const DOCUMENTS: &str = "documents";

pub fn users() -> ResourceConfig<UserRecord> {
    ResourceConfig {
        prefix: "/users",
        tags: &["Пользователи"],
        service: user_service,
        object_name: "пользователь",
        gender: Gender::Masculine,
        file_field: None,
        invalidates: &[USERS, DOCUMENTS],
    }
}

pub fn roles() -> ResourceConfig<RoleRecord> {
    ResourceConfig {
        prefix: "/roles",
        tags: &["Роли"],
        service: role_service,
        object_name: "роль",
        gender: Gender::Feminine,
        file_field: None,
        invalidates: &[ROLES, USERS, DOCUMENTS],
    }
}

pub fn patients() -> ResourceConfig<PatientRecord> {
    ResourceConfig {
        prefix: "/patients",
        tags: &["Пациенты"],
        service: patient_service,
        object_name: "пациент",
        gender: Gender::Masculine,
        file_field: None,
        invalidates: &[PATIENTS, DOCUMENTS],
    }
}

pub fn documents() -> ResourceConfig<DocumentRecord> {
    ResourceConfig {
        prefix: "/documents",
        tags: &["Документы"],
        service: document_service,
        object_name: "документ",
        gender: Gender::Masculine,
        file_field: Some(FileField {
            part: "file",
            field: "data",
            attach_to_create: attach_new_document,
            attach_to_update: attach_document_update,
            payload: document_payload,
            file_name: document_file_name,
        }),
        invalidates: &[DOCUMENTS],
    }
}

fn user_service(state: &AppState) -> Arc<dyn CrudService<UserRecord>> {
    state.users.clone()
}

fn role_service(state: &AppState) -> Arc<dyn CrudService<RoleRecord>> {
    state.roles.clone()
}

fn patient_service(state: &AppState) -> Arc<dyn CrudService<PatientRecord>> {
    state.patients.clone()
}

fn document_service(state: &AppState) -> Arc<dyn CrudService<DocumentRecord>> {
    state.documents.clone()
}

fn attach_new_document(data: &mut NewDocument, bytes: Vec<u8>) {
    data.data = bytes;
}

fn attach_document_update(data: &mut DocumentUpdate, bytes: Vec<u8>) {
    data.data = Some(bytes);
}

fn document_payload(record: &DocumentRecord) -> &[u8] {
    &record.data
}

fn document_file_name(record: &DocumentRecord) -> String {
    record.name.clone()
}
