use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::repository::{Record, RecordId, Repository, RepositoryError, ValidationError};
use crate::error::ApiError;

/// Extra validation that needs other repositories (foreign keys, scoped uniqueness).
pub type CrossCheck<T> = Arc<dyn Fn(&T) -> Result<(), ValidationError> + Send + Sync>;

/// Repository plus the validation hooks applied by the generic CRUD routes.
pub struct CrudResource<T: Record> {
    repository: Arc<dyn Repository<T>>,
    cross_check: Option<CrossCheck<T>>,
}

impl<T: Record> Clone for CrudResource<T> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cross_check: self.cross_check.clone(),
        }
    }
}

impl<T: Record> CrudResource<T> {
    pub fn new(repository: Arc<dyn Repository<T>>) -> Self {
        Self {
            repository,
            cross_check: None,
        }
    }

    pub fn with_cross_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.cross_check = Some(Arc::new(check));
        self
    }

    fn check(&self, record: &T) -> Result<(), ValidationError> {
        record.validate()?;
        match &self.cross_check {
            Some(check) => check(record),
            None => Ok(()),
        }
    }

    pub fn create(&self, record: T) -> Result<T, ApiError> {
        self.check(&record)?;
        let stored = self.repository.insert(record)?;
        info!(resource = T::RESOURCE, id = stored.id(), "record created");
        Ok(stored)
    }

    pub fn replace(&self, id: RecordId, mut record: T) -> Result<T, ApiError> {
        record.set_id(id);
        self.check(&record)?;
        let stored = self.repository.update(record).map_err(|err| match err {
            RepositoryError::NotFound => ApiError::not_found(T::RESOURCE, id),
            other => other.into(),
        })?;
        info!(resource = T::RESOURCE, id, "record updated");
        Ok(stored)
    }

    pub fn get(&self, id: RecordId) -> Result<T, ApiError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ApiError::not_found(T::RESOURCE, id))
    }

    pub fn list(&self) -> Result<Vec<T>, ApiError> {
        Ok(self.repository.list()?)
    }

    pub fn remove(&self, id: RecordId) -> Result<T, ApiError> {
        let removed = self.repository.delete(id).map_err(|err| match err {
            RepositoryError::NotFound => ApiError::not_found(T::RESOURCE, id),
            other => other.into(),
        })?;
        info!(resource = T::RESOURCE, id, "record deleted");
        Ok(removed)
    }

    /// Apply the keys of a JSON object onto the stored record (partial update).
    pub fn merge(&self, id: RecordId, changes: Value) -> Result<T, ApiError> {
        let current = self.get(id)?;
        let mut merged =
            serde_json::to_value(&current).map_err(|err| ApiError::Payload(err.to_string()))?;

        let (Value::Object(target), Value::Object(changes)) = (&mut merged, changes) else {
            return Err(ApiError::Payload("partial update expects a JSON object".to_string()));
        };
        for (key, value) in changes {
            if key != "id" {
                target.insert(key, value);
            }
        }

        let record: T =
            serde_json::from_value(merged).map_err(|err| ApiError::Payload(err.to_string()))?;
        self.replace(id, record)
    }
}

/// `limit`/`offset` query parameters accepted by list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PageParams {
    pub fn apply<T>(self, items: Vec<T>) -> Page<T> {
        let count = items.len();
        let offset = self.offset.unwrap_or(0);
        let results = items
            .into_iter()
            .skip(offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();
        Page { count, results }
    }
}

/// Paginated list payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub results: Vec<T>,
}

/// Router exposing list/create/retrieve/replace/patch/delete for a record type.
pub fn crud_router<T: Record>(path: &str, resource: CrudResource<T>) -> Router {
    let item_path = format!("{path}/:id");
    Router::new()
        .route(path, get(list_handler::<T>).post(create_handler::<T>))
        .route(
            &item_path,
            get(retrieve_handler::<T>)
                .put(update_handler::<T>)
                .patch(patch_handler::<T>)
                .delete(delete_handler::<T>),
        )
        .with_state(resource)
}

pub(crate) async fn list_handler<T: Record>(
    State(resource): State<CrudResource<T>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<T>>, ApiError> {
    Ok(Json(params.apply(resource.list()?)))
}

pub(crate) async fn create_handler<T: Record>(
    State(resource): State<CrudResource<T>>,
    Json(record): Json<T>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = resource.create(record)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub(crate) async fn retrieve_handler<T: Record>(
    State(resource): State<CrudResource<T>>,
    Path(id): Path<RecordId>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(resource.get(id)?))
}

pub(crate) async fn update_handler<T: Record>(
    State(resource): State<CrudResource<T>>,
    Path(id): Path<RecordId>,
    Json(record): Json<T>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(resource.replace(id, record)?))
}

pub(crate) async fn patch_handler<T: Record>(
    State(resource): State<CrudResource<T>>,
    Path(id): Path<RecordId>,
    Json(changes): Json<Value>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(resource.merge(id, changes)?))
}

pub(crate) async fn delete_handler<T: Record>(
    State(resource): State<CrudResource<T>>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    resource.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}
