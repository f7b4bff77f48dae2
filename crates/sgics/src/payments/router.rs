use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{Balance, NewPayment, Payment, VoidRequest};
use super::service::{PaymentError, PaymentService};
use crate::error::ApiError;
use crate::records::{Page, PageParams, RecordId};

pub fn payment_router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/api/v1/payments", get(list_handler).post(register_handler))
        .route("/api/v1/payments/:id", get(retrieve_handler))
        .route("/api/v1/payments/:id/void", post(void_handler))
        .route(
            "/api/v1/payments/balance/:preinscription_id",
            get(balance_handler),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    preinscription_id: Option<RecordId>,
    limit: Option<usize>,
    offset: Option<usize>,
}

pub(crate) async fn register_handler(
    State(service): State<Arc<PaymentService>>,
    Json(request): Json<NewPayment>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = service.register(request)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub(crate) async fn list_handler(
    State(service): State<Arc<PaymentService>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Payment>>, ApiError> {
    let page = PageParams {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(page.apply(service.list(query.preinscription_id)?)))
}

pub(crate) async fn retrieve_handler(
    State(service): State<Arc<PaymentService>>,
    Path(id): Path<RecordId>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(service.get(id)?))
}

pub(crate) async fn void_handler(
    State(service): State<Arc<PaymentService>>,
    Path(id): Path<RecordId>,
    Json(request): Json<VoidRequest>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(service.void(id, &request.reason)?))
}

pub(crate) async fn balance_handler(
    State(service): State<Arc<PaymentService>>,
    Path(preinscription_id): Path<RecordId>,
) -> Result<Json<Balance>, ApiError> {
    service
        .balance(preinscription_id)
        .map(Json)
        .map_err(|err| match err {
            PaymentError::PreinscriptionNotFound(id) => ApiError::not_found("preinscription", id),
            other => other.into(),
        })
}
