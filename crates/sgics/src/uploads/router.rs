use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::service::{UploadRecord, UploadService};
use crate::error::ApiError;
use crate::records::{Page, PageParams, RecordId};

/// Upload routes. The request body limit follows the configured maximum so oversized
/// files reach the service and get a descriptive error.
pub fn upload_router(service: Arc<UploadService>) -> Router {
    let body_limit = usize::try_from(service.max_bytes().saturating_add(1)).unwrap_or(usize::MAX);
    Router::new()
        .route("/api/v1/uploads", get(list_handler).post(upload_handler))
        .route(
            "/api/v1/uploads/:id",
            get(retrieve_handler).delete(delete_handler),
        )
        .route("/api/v1/uploads/:id/content", get(content_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    name: String,
    person_id: Option<RecordId>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    person_id: Option<RecordId>,
    limit: Option<usize>,
    offset: Option<usize>,
}

pub(crate) async fn upload_handler(
    State(service): State<Arc<UploadService>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let record = service.store(&query.name, &body, query.person_id)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn list_handler(
    State(service): State<Arc<UploadService>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<UploadRecord>>, ApiError> {
    let page = PageParams {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(page.apply(service.list(query.person_id)?)))
}

pub(crate) async fn retrieve_handler(
    State(service): State<Arc<UploadService>>,
    Path(id): Path<RecordId>,
) -> Result<Json<UploadRecord>, ApiError> {
    Ok(Json(service.get(id)?))
}

pub(crate) async fn content_handler(
    State(service): State<Arc<UploadService>>,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    let (record, bytes) = service.content(id)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        record.stored_name.replace('"', "")
    );
    Ok((
        [
            (CONTENT_TYPE, record.content_type),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub(crate) async fn delete_handler(
    State(service): State<Arc<UploadService>>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    service.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}
