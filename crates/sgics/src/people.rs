//! People registry keyed by RUT.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::accounts::validate_email;
use crate::catalog::Catalog;
use crate::error::ApiError;
use crate::records::{
    crud_router, ensure_exists, require_text, CrudResource, Record, RecordId, Repository,
    ValidationError,
};
use crate::rut::Rut;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: RecordId,
    pub rut: Rut,
    pub first_names: String,
    pub last_names: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub commune_id: Option<RecordId>,
    #[serde(default)]
    pub group_id: Option<RecordId>,
    #[serde(default)]
    pub branch_id: Option<RecordId>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names.trim(), self.last_names.trim())
    }
}

impl Record for Person {
    const RESOURCE: &'static str = "person";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.rut.compact())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("first_names", &self.first_names)?;
        require_text("last_names", &self.last_names)?;
        if let Some(email) = &self.email {
            validate_email("email", email)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct PeopleState {
    people: Arc<dyn Repository<Person>>,
}

#[derive(Debug, Deserialize)]
pub struct RutCheckRequest {
    pub rut: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RutCheckResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RutCheckResponse {
    pub fn check(raw: &str) -> Self {
        match Rut::parse(raw) {
            Ok(rut) => Self {
                valid: true,
                formatted: Some(rut.formatted()),
                error: None,
            },
            Err(err) => Self {
                valid: false,
                formatted: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Find a person by RUT in any accepted spelling.
pub fn find_by_rut(
    people: &dyn Repository<Person>,
    rut: &Rut,
) -> Result<Option<Person>, ApiError> {
    Ok(people
        .list()?
        .into_iter()
        .find(|person| person.rut == *rut))
}

pub fn people_router(people: Arc<dyn Repository<Person>>, catalog: &Catalog) -> Router {
    let communes = Arc::clone(&catalog.communes);
    let groups = Arc::clone(&catalog.groups);
    let branches = Arc::clone(&catalog.branches);
    let resource = CrudResource::new(Arc::clone(&people)).with_cross_check(move |person: &Person| {
        ensure_exists(communes.as_ref(), "commune_id", person.commune_id)?;
        ensure_exists(groups.as_ref(), "group_id", person.group_id)?;
        ensure_exists(branches.as_ref(), "branch_id", person.branch_id)
    });

    let lookups = Router::new()
        .route("/api/v1/people/by-rut/:rut", get(by_rut_handler))
        .route("/api/v1/rut/validate", post(rut_check_handler))
        .with_state(PeopleState { people });

    crud_router("/api/v1/people", resource).merge(lookups)
}

async fn by_rut_handler(
    State(state): State<PeopleState>,
    Path(raw): Path<String>,
) -> Result<Json<Person>, ApiError> {
    let rut = Rut::parse(&raw).map_err(|err| ValidationError::new("rut", err.to_string()))?;
    find_by_rut(state.people.as_ref(), &rut)?
        .map(Json)
        .ok_or_else(|| ApiError::Missing(format!("no person registered with RUT {rut}")))
}

async fn rut_check_handler(Json(request): Json<RutCheckRequest>) -> Json<RutCheckResponse> {
    Json(RutCheckResponse::check(&request.rut))
}
