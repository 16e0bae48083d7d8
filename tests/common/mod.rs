#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use time::{Date, OffsetDateTime};
use tokio::sync::{Mutex, oneshot};
use tower::ServiceExt;

use medrecords::application::auth::AuthService;
use medrecords::application::auth::passwords::PasswordHasher;
use medrecords::application::auth::tokens::TokenCodec;
use medrecords::application::repos::{
    CreateUserParams, EntityRepo, ObservabilitySnapshot, RepoError, StatisticsRepo,
    UpdateUserParams, UsersRepo,
};
use medrecords::application::service::{CrudService, EntityService};
use medrecords::application::statistics::StatisticsService;
use medrecords::application::users::UserService;
use medrecords::cache::{CacheConfig, ResponseCache};
use medrecords::domain::entities::{
    DocumentRecord, PatientRecord, RoleRecord, UserCredentials, UserRecord,
};
use medrecords::domain::schemas::{
    DocumentUpdate, NewDocument, NewPatient, NewRole, NewUser, PatientUpdate, RoleUpdate,
};
use medrecords::infra::http::{self, AppState};

pub const API: &str = "/api/v1";
pub const JWT_SECRET: &[u8] = b"integration-secret";

#[derive(Default)]
struct Tables {
    next_id: i64,
    roles: BTreeMap<i64, RoleRecord>,
    users: BTreeMap<i64, (UserRecord, Vec<u8>)>,
    patients: BTreeMap<i64, PatientRecord>,
    documents: BTreeMap<i64, DocumentRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Pauses one patient listing after its rows were read.
struct ListGate {
    fetched: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Keeps every table in memory and enforces the same unique and foreign key
/// rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub patient_reads: AtomicUsize,
    pub documents_created_on: Mutex<Vec<(Date, Option<i64>)>>,
    patient_list_gate: Mutex<Option<ListGate>>,
}

impl MemoryStore {
    pub fn patient_reads(&self) -> usize {
        self.patient_reads.load(Ordering::SeqCst)
    }

    /// The next patient listing signals `fetched` once it holds its rows and
    /// returns them only after `release` fires.
    pub async fn hold_next_patient_list(
        &self,
        fetched: oneshot::Sender<()>,
        release: oneshot::Receiver<()>,
    ) {
        *self.patient_list_gate.lock().await = Some(ListGate { fetched, release });
    }
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

fn missing_reference(table: &str) -> RepoError {
    RepoError::InvalidInput {
        message: format!("referenced {table} row does not exist"),
    }
}

#[async_trait]
impl EntityRepo<RoleRecord> for MemoryStore {
    async fn list_all(&self) -> Result<Vec<RoleRecord>, RepoError> {
        Ok(self.tables.lock().await.roles.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RoleRecord>, RepoError> {
        Ok(self.tables.lock().await.roles.get(&id).cloned())
    }

    async fn create(&self, params: NewRole) -> Result<RoleRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.roles.values().any(|role| role.name == params.name) {
            return Err(duplicate("roles_name_key"));
        }
        let now = OffsetDateTime::now_utc();
        let record = RoleRecord {
            id: tables.next_id(),
            name: params.name,
            description: params.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, changes: RoleUpdate) -> Result<Option<RoleRecord>, RepoError> {
        let mut tables = self.tables.lock().await;
        let Some(role) = tables.roles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = description;
        }
        role.updated_at = OffsetDateTime::now_utc();
        Ok(Some(role.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let removed = tables.roles.remove(&id).is_some();
        let dropped: Vec<i64> = tables
            .users
            .values()
            .filter(|(user, _)| user.role_id == id)
            .map(|(user, _)| user.id)
            .collect();
        tables.users.retain(|_, (user, _)| user.role_id != id);
        for document in tables.documents.values_mut() {
            if document.author_id.is_some_and(|author| dropped.contains(&author)) {
                document.author_id = None;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl EntityRepo<PatientRecord> for MemoryStore {
    async fn list_all(&self) -> Result<Vec<PatientRecord>, RepoError> {
        self.patient_reads.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<PatientRecord> =
            self.tables.lock().await.patients.values().cloned().collect();
        let gate = self.patient_list_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.fetched.send(());
            let _ = gate.release.await;
        }
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PatientRecord>, RepoError> {
        self.patient_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().await.patients.get(&id).cloned())
    }

    async fn create(&self, params: NewPatient) -> Result<PatientRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.patients.values().any(|patient| patient.fio == params.fio) {
            return Err(duplicate("patients_fio_key"));
        }
        let now = OffsetDateTime::now_utc();
        let record = PatientRecord {
            id: tables.next_id(),
            fio: params.fio,
            age: params.age,
            created_at: now,
            updated_at: now,
        };
        tables.patients.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        changes: PatientUpdate,
    ) -> Result<Option<PatientRecord>, RepoError> {
        let mut tables = self.tables.lock().await;
        let Some(patient) = tables.patients.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(fio) = changes.fio {
            patient.fio = fio;
        }
        if let Some(age) = changes.age {
            patient.age = age;
        }
        patient.updated_at = OffsetDateTime::now_utc();
        Ok(Some(patient.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let removed = tables.patients.remove(&id).is_some();
        tables.documents.retain(|_, document| document.patient_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl EntityRepo<DocumentRecord> for MemoryStore {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>, RepoError> {
        Ok(self.tables.lock().await.documents.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DocumentRecord>, RepoError> {
        Ok(self.tables.lock().await.documents.get(&id).cloned())
    }

    async fn create(&self, params: NewDocument) -> Result<DocumentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.patients.contains_key(&params.patient_id) {
            return Err(missing_reference("patients"));
        }
        if params
            .author_id
            .is_some_and(|author_id| !tables.users.contains_key(&author_id))
        {
            return Err(missing_reference("users"));
        }
        let now = OffsetDateTime::now_utc();
        let record = DocumentRecord {
            id: tables.next_id(),
            name: params.name,
            data: params.data,
            subdirectory_type: params.subdirectory_type,
            patient_id: params.patient_id,
            author_id: params.author_id,
            created_at: now,
            updated_at: now,
        };
        tables.documents.insert(record.id, record.clone());
        self.documents_created_on
            .lock()
            .await
            .push((now.date(), record.author_id));
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        changes: DocumentUpdate,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let mut tables = self.tables.lock().await;
        if changes
            .patient_id
            .is_some_and(|patient_id| !tables.patients.contains_key(&patient_id))
        {
            return Err(missing_reference("patients"));
        }
        let Some(document) = tables.documents.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            document.name = name;
        }
        if let Some(data) = changes.data {
            document.data = data;
        }
        if let Some(category) = changes.subdirectory_type {
            document.subdirectory_type = category;
        }
        if let Some(patient_id) = changes.patient_id {
            document.patient_id = patient_id;
        }
        if let Some(author_id) = changes.author_id {
            document.author_id = author_id;
        }
        document.updated_at = OffsetDateTime::now_utc();
        Ok(Some(document.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.tables.lock().await.documents.remove(&id).is_some())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .map(|(user, _)| user.clone())
            .collect())
    }

    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .get(&id)
            .map(|(user, _)| user.clone()))
    }

    async fn find_credentials_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserCredentials>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|(user, _)| user.login == login)
            .map(|(user, hash)| UserCredentials {
                id: user.id,
                login: user.login.clone(),
                password_hash: hash.clone(),
                active: user.active,
                role_id: user.role_id,
            }))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|(user, _)| user.login == params.login) {
            return Err(duplicate("users_login_key"));
        }
        if tables.users.values().any(|(user, _)| user.fio == params.fio) {
            return Err(duplicate("users_fio_key"));
        }
        if !tables.roles.contains_key(&params.role_id) {
            return Err(missing_reference("roles"));
        }
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: tables.next_id(),
            fio: params.fio,
            login: params.login,
            active: true,
            role_id: params.role_id,
            created_at: now,
            updated_at: now,
        };
        tables
            .users
            .insert(record.id, (record.clone(), params.password_hash));
        Ok(record)
    }

    async fn update_user(
        &self,
        id: i64,
        params: UpdateUserParams,
    ) -> Result<Option<UserRecord>, RepoError> {
        let mut tables = self.tables.lock().await;
        let Some((user, hash)) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(fio) = params.fio {
            user.fio = fio;
        }
        if let Some(login) = params.login {
            user.login = login;
        }
        if let Some(password_hash) = params.password_hash {
            *hash = password_hash;
        }
        if let Some(role_id) = params.role_id {
            user.role_id = role_id;
        }
        if let Some(active) = params.active {
            user.active = active;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let removed = tables.users.remove(&id).is_some();
        for document in tables.documents.values_mut() {
            if document.author_id == Some(id) {
                document.author_id = None;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl StatisticsRepo for MemoryStore {
    async fn ping(&self) -> Result<Duration, RepoError> {
        Ok(Duration::from_millis(1))
    }

    async fn observability_snapshot(&self) -> Result<ObservabilitySnapshot, RepoError> {
        let tables = self.tables.lock().await;
        Ok(ObservabilitySnapshot {
            documents_total: tables.documents.len() as i64,
            patient_ages: tables.patients.values().map(|patient| patient.age).collect(),
            ..ObservabilitySnapshot::default()
        })
    }

    async fn daily_document_counts(
        &self,
        since: Date,
        author_id: Option<i64>,
    ) -> Result<Vec<(Date, i64)>, RepoError> {
        let created = self.documents_created_on.lock().await;
        let mut by_day: BTreeMap<Date, i64> = BTreeMap::new();
        for (day, author) in created.iter() {
            if *day >= since && (author_id.is_none() || *author == author_id) {
                *by_day.entry(*day).or_default() += 1;
            }
        }
        Ok(by_day.into_iter().collect())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<TokenCodec>,
    pub state: AppState,
}

pub fn test_app() -> TestApp {
    test_app_with_metrics(None)
}

pub fn test_app_with_metrics(metrics: Option<PrometheusHandle>) -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let tokens = Arc::new(TokenCodec::hmac(
        JWT_SECRET,
        time::Duration::minutes(15),
        time::Duration::days(7),
    ));

    let users_repo: Arc<dyn UsersRepo> = store.clone();
    let roles_repo: Arc<dyn EntityRepo<RoleRecord>> = store.clone();
    let patients_repo: Arc<dyn EntityRepo<PatientRecord>> = store.clone();
    let documents_repo: Arc<dyn EntityRepo<DocumentRecord>> = store.clone();
    let statistics_repo: Arc<dyn StatisticsRepo> = store.clone();

    let users = Arc::new(UserService::new(users_repo, PasswordHasher::new(4)));
    let roles: Arc<dyn CrudService<RoleRecord>> = Arc::new(EntityService::new(roles_repo));
    let auth = Arc::new(AuthService::new(users.clone(), roles.clone(), tokens.clone()));

    let state = AppState {
        users,
        roles,
        patients: Arc::new(EntityService::new(patients_repo)),
        documents: Arc::new(EntityService::new(documents_repo)),
        auth,
        statistics: Arc::new(StatisticsService::new(statistics_repo)),
        cache: ResponseCache::in_memory(CacheConfig::default()),
        metrics,
        upload_limit_bytes: 1024 * 1024,
        api_prefix: API.to_string(),
    };

    TestApp {
        router: http::build_router(state.clone()),
        store,
        tokens,
        state,
    }
}

impl TestApp {
    /// Creates a role and a user through the services and returns the
    /// user's id with a fresh access token.
    pub async fn signed_in(&self, login: &str) -> (i64, String) {
        let role_id = match self
            .state
            .roles
            .create_object(NewRole {
                name: "administrator".to_string(),
                description: None,
            })
            .await
        {
            Ok(role) => role.id,
            Err(_) => self
                .state
                .roles
                .get_all_objects()
                .await
                .expect("roles list")
                .first()
                .expect("role exists")
                .id,
        };

        let user = self
            .state
            .users
            .create_object(NewUser {
                fio: format!("Operator {login}"),
                login: login.to_string(),
                password: "correct-horse".to_string(),
                role_id,
            })
            .await
            .expect("user created");

        let credentials = self
            .state
            .users
            .get_object_by_login(login)
            .await
            .expect("lookup")
            .expect("user stored");
        let pair = self.tokens.issue_pair(&credentials).expect("token pair");
        (user.id, pair.access_token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        (status, headers, body)
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("response should be json")
        };
        (status, value)
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method("GET").uri(uri), token)
        .body(Body::empty())
        .expect("request should build")
}

pub fn delete(uri: &str, token: &str) -> Request<Body> {
    with_auth(Request::builder().method("DELETE").uri(uri), Some(token))
        .body(Body::empty())
        .expect("request should build")
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn form(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let encoded = fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(encoded))
        .expect("request should build")
}

pub const BOUNDARY: &str = "medrecords-test-boundary";

/// Multipart body with an optional `form_data` JSON part and an optional
/// `file` part.
pub fn multipart(
    method: &str,
    uri: &str,
    token: &str,
    form_data: Option<&str>,
    file: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    if let Some(form_data) = form_data {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"form_data\"\r\n\r\n{form_data}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    with_auth(Request::builder().method(method).uri(uri), Some(token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request should build")
}

fn with_auth(
    builder: axum::http::request::Builder,
    token: Option<&str>,
) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}
