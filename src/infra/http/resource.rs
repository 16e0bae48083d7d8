//! Generic CRUD router factory.
//!
//! One call to [`create_base_router`] yields list, create, get, update and
//! delete routes for a resource, plus a download route when the resource
//! carries a binary payload. Reads go through the response cache; writes
//! purge the namespaces listed in [`ResourceConfig::invalidates`].

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use crate::application::service::{CrudService, ServiceError};
use crate::cache::CachedValue;
use crate::domain::inflection::{Gender, NounForms};
use crate::domain::resource::Resource;

use super::error::{Action, ApiError};
use super::state::AppState;

const MODULE_PATH: &str = module_path!();
const SOURCE: &str = "infra::http::resource";

/// Multipart part carrying the JSON payload next to the file.
pub const FORM_DATA_PART: &str = "form_data";

/// Binary payload attached to a resource.
pub struct FileField<R: Resource> {
    /// Multipart part the upload arrives in.
    pub part: &'static str,
    /// Payload field on the schemas; ignored when present in `form_data`.
    pub field: &'static str,
    pub attach_to_create: fn(&mut R::Create, Vec<u8>),
    pub attach_to_update: fn(&mut R::Update, Vec<u8>),
    pub payload: fn(&R) -> &[u8],
    pub file_name: fn(&R) -> String,
}

pub struct ResourceConfig<R: Resource> {
    /// Path segment such as `/patients`; also names the cache namespace.
    pub prefix: &'static str,
    pub tags: &'static [&'static str],
    pub service: fn(&AppState) -> Arc<dyn CrudService<R>>,
    /// Singular name in the nominative case, used for messages.
    pub object_name: &'static str,
    pub gender: Gender,
    pub file_field: Option<FileField<R>>,
    /// Cache namespaces whose entries a write to this resource makes stale.
    pub invalidates: &'static [&'static str],
}

impl<R: Resource> ResourceConfig<R> {
    pub fn namespace(&self) -> &'static str {
        self.prefix.trim_matches('/')
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationDoc {
    pub method: &'static str,
    pub path: String,
    pub tags: Vec<&'static str>,
    pub description: String,
    pub responses: Vec<ResponseDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseDoc {
    pub status: u16,
    pub description: String,
}

impl ResponseDoc {
    pub fn new(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            description: description.into(),
        }
    }
}

struct ResourceContext<R: Resource> {
    config: ResourceConfig<R>,
    forms: NounForms,
}

impl<R: Resource> ResourceContext<R> {
    fn service(&self, state: &AppState) -> Arc<dyn CrudService<R>> {
        (self.config.service)(state)
    }

    fn namespace(&self) -> &'static str {
        self.config.namespace()
    }

    fn failure(&self, err: ServiceError, action: Action) -> ApiError {
        ApiError::from_service(err, &self.forms, action).with_source(SOURCE)
    }

    fn not_found(&self) -> ApiError {
        ApiError::not_found(self.forms.not_found()).with_source(SOURCE)
    }

    fn file_field(&self) -> Result<&FileField<R>, ApiError> {
        self.config
            .file_field
            .as_ref()
            .ok_or_else(|| ApiError::internal("resource has no file field"))
    }

    async fn invalidate(&self, state: &AppState) {
        state.cache.invalidate(self.config.invalidates).await;
    }
}

/// Builds the routes for one resource under `<api_prefix><prefix>`.
pub fn create_base_router<R: Resource>(
    config: ResourceConfig<R>,
    api_prefix: &str,
) -> (Router<AppState>, Vec<OperationDoc>) {
    let collection = format!("{api_prefix}{}", config.prefix);
    let item = format!("{collection}/{{obj_id}}");
    let forms = NounForms::new(config.object_name, config.gender);
    let docs = operation_docs(&config, &forms, &collection, &item);
    let has_file = config.file_field.is_some();
    let ctx = Arc::new(ResourceContext { config, forms });

    let list = {
        let ctx = ctx.clone();
        move |state: State<AppState>| list_objects(ctx.clone(), state)
    };
    let fetch = {
        let ctx = ctx.clone();
        move |state: State<AppState>, id: Result<Path<i64>, PathRejection>| {
            get_object(ctx.clone(), state, id)
        }
    };
    let remove = {
        let ctx = ctx.clone();
        move |state: State<AppState>, id: Result<Path<i64>, PathRejection>| {
            delete_object(ctx.clone(), state, id)
        }
    };

    let mut router = Router::new();

    if has_file {
        let create = {
            let ctx = ctx.clone();
            move |state: State<AppState>, form: Result<Multipart, MultipartRejection>| {
                create_object_with_file(ctx.clone(), state, form)
            }
        };
        let update = {
            let ctx = ctx.clone();
            move |state: State<AppState>,
                  id: Result<Path<i64>, PathRejection>,
                  form: Result<Multipart, MultipartRejection>| {
                update_object_with_file(ctx.clone(), state, id, form)
            }
        };
        let download = {
            let ctx = ctx.clone();
            move |state: State<AppState>, id: Result<Path<i64>, PathRejection>| {
                download_file(ctx.clone(), state, id)
            }
        };

        router = router
            .route(&collection, get(list).post(create))
            .route(&item, get(fetch).put(update).delete(remove))
            .route(&format!("{item}/download"), get(download));
    } else {
        let create = {
            let ctx = ctx.clone();
            move |state: State<AppState>, payload: Result<Json<R::Create>, JsonRejection>| {
                create_object(ctx.clone(), state, payload)
            }
        };
        let update = {
            let ctx = ctx.clone();
            move |state: State<AppState>,
                  id: Result<Path<i64>, PathRejection>,
                  payload: Result<Json<R::Update>, JsonRejection>| {
                update_object(ctx.clone(), state, id, payload)
            }
        };

        router = router
            .route(&collection, get(list).post(create))
            .route(&item, get(fetch).put(update).delete(remove));
    }

    (router, docs)
}

async fn list_objects<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let namespace = ctx.namespace();
    let key = state.cache.key(namespace, MODULE_PATH, "get_all").build();
    if let Some(CachedValue::Json(value)) = state.cache.get(namespace, &key).await {
        return Ok(Json(value).into_response());
    }

    let observed = state.cache.generation(namespace);
    let objects = ctx
        .service(&state)
        .get_all_objects()
        .await
        .map_err(|err| ctx.failure(err, Action::Read))?;
    let value = serde_json::to_value(&objects).map_err(ApiError::internal)?;
    state
        .cache
        .put(namespace, observed, &key, &CachedValue::Json(value.clone()))
        .await;
    Ok(Json(value).into_response())
}

async fn get_object<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(ApiError::from_path_rejection)?;
    let namespace = ctx.namespace();
    let key = state
        .cache
        .key(namespace, MODULE_PATH, "get_by_id")
        .arg("obj_id", id)
        .build();
    if let Some(CachedValue::Json(value)) = state.cache.get(namespace, &key).await {
        return Ok(Json(value).into_response());
    }

    let observed = state.cache.generation(namespace);
    let object = ctx
        .service(&state)
        .get_object_by_id(id)
        .await
        .map_err(|err| ctx.failure(err, Action::Read))?
        .ok_or_else(|| ctx.not_found())?;
    let value = serde_json::to_value(&object).map_err(ApiError::internal)?;
    state
        .cache
        .put(namespace, observed, &key, &CachedValue::Json(value.clone()))
        .await;
    Ok(Json(value).into_response())
}

async fn create_object<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    payload: Result<Json<R::Create>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(data) = payload.map_err(ApiError::from_json_rejection)?;
    store_new(&ctx, &state, data).await
}

async fn create_object_with_file<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let file_field = ctx.file_field()?;
    let multipart = form.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let upload = read_multipart(multipart, file_field.part).await?;

    let mut data: R::Create = parse_form_data(upload.form_data, file_field.field, Action::Create)?;
    let file = upload.file.ok_or_else(|| {
        ApiError::unprocessable(&["body", file_field.part], "Field required", "missing")
    })?;
    (file_field.attach_to_create)(&mut data, file);

    store_new(&ctx, &state, data).await
}

async fn store_new<R: Resource>(
    ctx: &ResourceContext<R>,
    state: &AppState,
    data: R::Create,
) -> Result<Response, ApiError> {
    let created = ctx
        .service(state)
        .create_object(data)
        .await
        .map_err(|err| ctx.failure(err, Action::Create))?;
    ctx.invalidate(state).await;

    info!(
        target = "medrecords::http::resource",
        entity = R::ENTITY,
        id = created.id(),
        "object created"
    );
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn update_object<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<R::Update>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(ApiError::from_path_rejection)?;
    let Json(data) = payload.map_err(ApiError::from_json_rejection)?;
    store_changes(&ctx, &state, id, data).await
}

async fn update_object_with_file<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(ApiError::from_path_rejection)?;
    let file_field = ctx.file_field()?;
    let multipart = form.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let upload = read_multipart(multipart, file_field.part).await?;

    // Without a new file the stored payload stays as it is.
    let mut data: R::Update = parse_form_data(upload.form_data, file_field.field, Action::Update)?;
    if let Some(file) = upload.file {
        (file_field.attach_to_update)(&mut data, file);
    }

    store_changes(&ctx, &state, id, data).await
}

async fn store_changes<R: Resource>(
    ctx: &ResourceContext<R>,
    state: &AppState,
    id: i64,
    data: R::Update,
) -> Result<Response, ApiError> {
    let updated = ctx
        .service(state)
        .update_object(id, data)
        .await
        .map_err(|err| ctx.failure(err, Action::Update))?
        .ok_or_else(|| ctx.not_found())?;
    ctx.invalidate(state).await;

    info!(
        target = "medrecords::http::resource",
        entity = R::ENTITY,
        id,
        "object updated"
    );
    Ok(Json(updated).into_response())
}

async fn delete_object<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(ApiError::from_path_rejection)?;
    let removed = ctx
        .service(&state)
        .delete_object(id)
        .await
        .map_err(|err| ctx.failure(err, Action::Delete))?;
    if !removed {
        return Err(ctx.not_found());
    }
    ctx.invalidate(&state).await;

    info!(
        target = "medrecords::http::resource",
        entity = R::ENTITY,
        id,
        "object deleted"
    );
    Ok(Json(json!({ "detail": ctx.forms.deleted_successfully() })).into_response())
}

async fn download_file<R: Resource>(
    ctx: Arc<ResourceContext<R>>,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(ApiError::from_path_rejection)?;
    let file_field = ctx.file_field()?;
    let namespace = ctx.namespace();
    let payload_key = state
        .cache
        .key(namespace, MODULE_PATH, "download_file")
        .arg("obj_id", id)
        .build();
    let name_key = state
        .cache
        .key(namespace, MODULE_PATH, "download_file_name")
        .arg("obj_id", id)
        .build();

    let cached_payload = state.cache.get(namespace, &payload_key).await;
    let cached_name = state.cache.get(namespace, &name_key).await;
    if let (Some(CachedValue::Bytes(bytes)), Some(CachedValue::Json(Value::String(name)))) =
        (cached_payload, cached_name)
    {
        return Ok(file_response(bytes, &name));
    }

    let observed = state.cache.generation(namespace);
    let record = ctx
        .service(&state)
        .get_object_by_id(id)
        .await
        .map_err(|err| ctx.failure(err, Action::Read))?
        .ok_or_else(|| ctx.not_found())?;
    let bytes = (file_field.payload)(&record).to_vec();
    let mut name = (file_field.file_name)(&record);
    if name.trim().is_empty() {
        name = format!("{}_{id}", ctx.config.object_name);
    }

    state
        .cache
        .put(namespace, observed, &payload_key, &CachedValue::Bytes(bytes.clone()))
        .await;
    state
        .cache
        .put(
            namespace,
            observed,
            &name_key,
            &CachedValue::Json(Value::String(name.clone())),
        )
        .await;
    Ok(file_response(bytes, &name))
}

fn file_response(bytes: Vec<u8>, file_name: &str) -> Response {
    let disposition = format!("attachment; filename={}", urlencoding::encode(file_name));
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    response
}

#[derive(Default)]
struct UploadedForm {
    file: Option<Vec<u8>>,
    form_data: Option<String>,
}

async fn read_multipart(mut multipart: Multipart, file_part: &str) -> Result<UploadedForm, ApiError> {
    let mut upload = UploadedForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(part) if part == file_part => {
                // Browsers send an empty, nameless part when no file is picked.
                let has_file_name = field
                    .file_name()
                    .is_some_and(|value| !value.trim().is_empty());
                let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
                if has_file_name {
                    upload.file = Some(bytes.to_vec());
                }
            }
            Some(FORM_DATA_PART) => {
                upload.form_data = Some(field.text().await.map_err(ApiError::from_multipart)?);
            }
            _ => continue,
        }
    }

    Ok(upload)
}

fn parse_form_data<T: DeserializeOwned>(
    form_data: Option<String>,
    payload_field: &str,
    action: Action,
) -> Result<T, ApiError> {
    let raw = form_data.ok_or_else(|| {
        ApiError::unprocessable(&["body", FORM_DATA_PART], "Field required", "missing")
    })?;
    let mut value: Value = serde_json::from_str(&raw).map_err(|err| {
        ApiError::bad_request("Невалидный JSON в form_data")
            .with_cause(err)
            .with_source(SOURCE)
    })?;
    if let Value::Object(map) = &mut value {
        map.remove(payload_field);
    }
    serde_json::from_value(value).map_err(|err| {
        ApiError::bad_request(format!("{}: {err}", action.failure_prefix())).with_source(SOURCE)
    })
}

fn operation_docs<R: Resource>(
    config: &ResourceConfig<R>,
    forms: &NounForms,
    collection: &str,
    item: &str,
) -> Vec<OperationDoc> {
    let tags = config.tags.to_vec();
    let not_found = ResponseDoc::new(StatusCode::NOT_FOUND, forms.not_found());
    let doc = |method: &'static str, path: &str, description: String, responses: Vec<ResponseDoc>| {
        OperationDoc {
            method,
            path: path.to_string(),
            tags: tags.clone(),
            description,
            responses,
        }
    };
    let with_file = if config.file_field.is_some() {
        " с файлом"
    } else {
        ""
    };

    let mut docs = vec![
        doc(
            "GET",
            collection,
            format!(
                "Получение списка всех {} в формате JSON.",
                forms.genitive_plural
            ),
            vec![
                ResponseDoc::new(StatusCode::OK, "Успешный ответ"),
                ResponseDoc::new(StatusCode::BAD_REQUEST, "Неверный запрос"),
            ],
        ),
        doc(
            "POST",
            collection,
            format!("Создание {} {}{with_file}.", forms.new_genitive, forms.genitive),
            vec![
                ResponseDoc::new(
                    StatusCode::CREATED,
                    format!("{} {}", forms.title(), forms.created),
                ),
                ResponseDoc::new(StatusCode::BAD_REQUEST, "Ошибка создания"),
                ResponseDoc::new(StatusCode::CONFLICT, "Нарушение уникальности"),
            ],
        ),
        doc(
            "GET",
            item,
            format!("Получение {} по идентификатору.", forms.genitive),
            vec![
                ResponseDoc::new(StatusCode::OK, "Успешный ответ"),
                not_found.clone(),
            ],
        ),
        doc(
            "PUT",
            item,
            format!("Обновление {}{with_file}.", forms.genitive),
            vec![
                ResponseDoc::new(
                    StatusCode::OK,
                    format!("{} {}", forms.title(), forms.updated),
                ),
                ResponseDoc::new(StatusCode::BAD_REQUEST, "Ошибка обновления"),
                not_found.clone(),
            ],
        ),
        doc(
            "DELETE",
            item,
            format!("Удаление {}.", forms.genitive),
            vec![
                ResponseDoc::new(StatusCode::OK, forms.deleted_successfully()),
                not_found.clone(),
            ],
        ),
    ];

    if config.file_field.is_some() {
        docs.push(doc(
            "GET",
            &format!("{item}/download"),
            format!("Скачивание файла {}.", forms.genitive),
            vec![ResponseDoc::new(StatusCode::OK, "Содержимое файла"), not_found],
        ));
    }

    docs
}
