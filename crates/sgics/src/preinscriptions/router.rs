use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::domain::{workflow, Preinscription, PreinscriptionStatus, StatusChange, WorkflowStep};
use super::service::{
    NewPreinscription, PreinscriptionFilter, PreinscriptionService, TransitionRequest,
};
use crate::error::ApiError;
use crate::records::{Page, PageParams, RecordId};

/// Router builder exposing the preinscription workflow endpoints.
pub fn preinscription_router(service: Arc<PreinscriptionService>) -> Router {
    Router::new()
        .route(
            "/api/v1/preinscriptions",
            get(list_handler).post(create_handler),
        )
        .route("/api/v1/preinscriptions/workflow", get(workflow_handler))
        .route(
            "/api/v1/preinscriptions/:id",
            get(retrieve_handler).delete(delete_handler),
        )
        .route(
            "/api/v1/preinscriptions/:id/transition",
            post(transition_handler),
        )
        .route("/api/v1/preinscriptions/:id/history", get(history_handler))
        .route(
            "/api/v1/preinscriptions/:id/transitions",
            get(transitions_handler),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    course_id: Option<RecordId>,
    person_id: Option<RecordId>,
    status: Option<PreinscriptionStatus>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// Where a preinscription may go next.
#[derive(Debug, Serialize)]
pub(crate) struct AvailableTransitions {
    id: RecordId,
    status: PreinscriptionStatus,
    allowed: Vec<PreinscriptionStatus>,
}

pub(crate) async fn create_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Json(request): Json<NewPreinscription>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = service.create(request)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub(crate) async fn list_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Preinscription>>, ApiError> {
    let filter = PreinscriptionFilter {
        course_id: query.course_id,
        person_id: query.person_id,
        status: query.status,
    };
    let page = PageParams {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(page.apply(service.list(&filter)?)))
}

pub(crate) async fn workflow_handler() -> Json<Vec<WorkflowStep>> {
    Json(workflow())
}

pub(crate) async fn retrieve_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Path(id): Path<RecordId>,
) -> Result<Json<Preinscription>, ApiError> {
    Ok(Json(service.get(id)?))
}

pub(crate) async fn delete_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    service.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn transition_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Path(id): Path<RecordId>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Preinscription>, ApiError> {
    Ok(Json(service.transition(id, request)?))
}

pub(crate) async fn history_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Path(id): Path<RecordId>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    Ok(Json(service.history(id)?))
}

pub(crate) async fn transitions_handler(
    State(service): State<Arc<PreinscriptionService>>,
    Path(id): Path<RecordId>,
) -> Result<Json<AvailableTransitions>, ApiError> {
    let preinscription = service.get(id)?;
    Ok(Json(AvailableTransitions {
        id,
        status: preinscription.status,
        allowed: preinscription.status.allowed_transitions().to_vec(),
    }))
}
