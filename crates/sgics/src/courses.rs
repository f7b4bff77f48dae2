use std::sync::Arc;

use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::people::Person;
use crate::records::{
    crud_router, ensure_exists, require_text, CrudResource, Record, RecordId, Repository,
    ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Closed,
    Cancelled,
}

impl CourseStatus {
    pub const fn ordered() -> [Self; 4] {
        [Self::Draft, Self::Published, Self::Closed, Self::Cancelled]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Borrador",
            Self::Published => "Publicado",
            Self::Closed => "Cerrado",
            Self::Cancelled => "Cancelado",
        }
    }

    /// Only published courses take new preinscriptions.
    pub const fn accepts_preinscriptions(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Training course offered to adult leaders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: RecordId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: u32,
    /// Fee in CLP.
    pub fee: u64,
    #[serde(default = "default_status")]
    pub status: CourseStatus,
    #[serde(default)]
    pub coordinator_id: Option<RecordId>,
}

fn default_status() -> CourseStatus {
    CourseStatus::Draft
}

impl Record for Course {
    const RESOURCE: &'static str = "course";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.code.trim().to_string())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)?;
        if self.end_date < self.start_date {
            return Err(ValidationError::new(
                "end_date",
                "must not be earlier than start_date",
            ));
        }
        if self.capacity == 0 {
            return Err(ValidationError::new("capacity", "must be greater than zero"));
        }
        Ok(())
    }
}

pub fn courses_router(
    courses: Arc<dyn Repository<Course>>,
    people: Arc<dyn Repository<Person>>,
) -> Router {
    let resource = CrudResource::new(courses).with_cross_check(move |course: &Course| {
        ensure_exists(people.as_ref(), "coordinator_id", course.coordinator_id)
    });
    crud_router("/api/v1/courses", resource)
}
