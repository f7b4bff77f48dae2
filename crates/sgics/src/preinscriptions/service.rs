use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::domain::{Preinscription, PreinscriptionStatus, StatusChange, TransitionError};
use crate::courses::Course;
use crate::error::ApiError;
use crate::notifications::{format_clp, EmailTemplate, Notifier};
use crate::people::Person;
use crate::records::{RecordId, Repository, RepositoryError, ValidationError};

/// Payload for opening a preinscription.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPreinscription {
    pub person_id: RecordId,
    pub course_id: RecordId,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payload for moving a preinscription through the workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub to: PreinscriptionStatus,
    #[serde(default)]
    pub actor_id: Option<RecordId>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Optional list filters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PreinscriptionFilter {
    pub course_id: Option<RecordId>,
    pub person_id: Option<RecordId>,
    pub status: Option<PreinscriptionStatus>,
}

impl PreinscriptionFilter {
    pub fn matches(&self, preinscription: &Preinscription) -> bool {
        self.course_id.map_or(true, |id| preinscription.course_id == id)
            && self.person_id.map_or(true, |id| preinscription.person_id == id)
            && self.status.map_or(true, |status| preinscription.status == status)
    }
}

/// Service composing the preinscription workflow with people, courses and notifications.
pub struct PreinscriptionService {
    preinscriptions: Arc<dyn Repository<Preinscription>>,
    people: Arc<dyn Repository<Person>>,
    courses: Arc<dyn Repository<Course>>,
    notifier: Notifier,
    // Serialises writes so capacity checks and duplicate checks see a stable view.
    write_lock: Mutex<()>,
}

impl PreinscriptionService {
    pub fn new(
        preinscriptions: Arc<dyn Repository<Preinscription>>,
        people: Arc<dyn Repository<Person>>,
        courses: Arc<dyn Repository<Course>>,
        notifier: Notifier,
    ) -> Self {
        Self {
            preinscriptions,
            people,
            courses,
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a draft preinscription for a published course.
    pub fn create(
        &self,
        request: NewPreinscription,
    ) -> Result<Preinscription, PreinscriptionError> {
        let _guard = self.lock()?;
        self.person(request.person_id)?;
        let course = self.course(request.course_id)?;

        if !course.status.accepts_preinscriptions() {
            return Err(PreinscriptionError::CourseClosed {
                code: course.code,
                status: course.status.label(),
            });
        }

        if let Some(existing) = self.preinscriptions.list()?.into_iter().find(|existing| {
            existing.person_id == request.person_id
                && existing.course_id == request.course_id
                && existing.status.is_active()
        }) {
            return Err(PreinscriptionError::Duplicate {
                existing: existing.id,
                person_id: request.person_id,
                course_id: request.course_id,
            });
        }

        let draft = Preinscription::new(
            request.person_id,
            request.course_id,
            request.notes,
            Utc::now(),
        );
        let stored = self.preinscriptions.insert(draft)?;
        info!(
            preinscription_id = stored.id,
            person_id = stored.person_id,
            course_id = stored.course_id,
            "preinscription opened"
        );
        Ok(stored)
    }

    /// Move a preinscription to `request.to`, enforcing the workflow table and course capacity.
    pub fn transition(
        &self,
        id: RecordId,
        request: TransitionRequest,
    ) -> Result<Preinscription, PreinscriptionError> {
        let _guard = self.lock()?;
        let mut preinscription = self.get(id)?;
        let course = self.course(preinscription.course_id)?;

        if request.to == PreinscriptionStatus::Confirmed
            && preinscription.status.can_transition(request.to)
        {
            let confirmed = self.confirmed_count(course.id)?;
            if confirmed >= course.capacity as usize {
                return Err(PreinscriptionError::CourseFull {
                    code: course.code,
                    capacity: course.capacity,
                });
            }
        }

        let change = preinscription.change_status(
            request.to,
            request.actor_id,
            Utc::now(),
            request.note,
        )?;
        let stored = self.preinscriptions.update(preinscription)?;

        info!(
            preinscription_id = stored.id,
            from = change.from.as_str(),
            to = change.to.as_str(),
            actor_id = ?change.actor_id,
            "preinscription status changed"
        );

        self.notify_change(&stored, &course, &change);
        Ok(stored)
    }

    pub fn get(&self, id: RecordId) -> Result<Preinscription, PreinscriptionError> {
        self.preinscriptions
            .fetch(id)?
            .ok_or(PreinscriptionError::NotFound(id))
    }

    pub fn list(
        &self,
        filter: &PreinscriptionFilter,
    ) -> Result<Vec<Preinscription>, PreinscriptionError> {
        Ok(self
            .preinscriptions
            .list()?
            .into_iter()
            .filter(|preinscription| filter.matches(preinscription))
            .collect())
    }

    pub fn history(&self, id: RecordId) -> Result<Vec<StatusChange>, PreinscriptionError> {
        Ok(self.get(id)?.history)
    }

    /// Drafts may be discarded; anything further along must be cancelled instead.
    pub fn delete(&self, id: RecordId) -> Result<Preinscription, PreinscriptionError> {
        let _guard = self.lock()?;
        let preinscription = self.get(id)?;
        if preinscription.status != PreinscriptionStatus::Draft {
            return Err(PreinscriptionError::NotDeletable(preinscription.status));
        }
        let removed = self.preinscriptions.delete(id)?;
        info!(preinscription_id = id, "draft preinscription deleted");
        Ok(removed)
    }

    pub fn confirmed_count(&self, course_id: RecordId) -> Result<usize, PreinscriptionError> {
        Ok(self
            .preinscriptions
            .list()?
            .iter()
            .filter(|preinscription| {
                preinscription.course_id == course_id
                    && preinscription.status == PreinscriptionStatus::Confirmed
            })
            .count())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, PreinscriptionError> {
        self.write_lock.lock().map_err(|_| {
            PreinscriptionError::Repository(RepositoryError::Unavailable(
                "preinscription write lock poisoned".to_string(),
            ))
        })
    }

    fn person(&self, id: RecordId) -> Result<Person, PreinscriptionError> {
        self.people
            .fetch(id)?
            .ok_or(PreinscriptionError::PersonNotFound(id))
    }

    fn course(&self, id: RecordId) -> Result<Course, PreinscriptionError> {
        self.courses
            .fetch(id)?
            .ok_or(PreinscriptionError::CourseNotFound(id))
    }

    fn notify_change(
        &self,
        preinscription: &Preinscription,
        course: &Course,
        change: &StatusChange,
    ) {
        let template = match change.to {
            PreinscriptionStatus::Submitted => EmailTemplate::PreinscriptionSubmitted,
            PreinscriptionStatus::Validated => EmailTemplate::PreinscriptionValidated,
            PreinscriptionStatus::Confirmed => EmailTemplate::PreinscriptionConfirmed,
            PreinscriptionStatus::Rejected => EmailTemplate::PreinscriptionRejected,
            _ => return,
        };

        let person = match self.people.fetch(preinscription.person_id) {
            Ok(Some(person)) => person,
            _ => return,
        };

        let mut context = BTreeMap::new();
        context.insert("person_name".to_string(), person.full_name());
        context.insert("course_name".to_string(), course.name.clone());
        context.insert("course_code".to_string(), course.code.clone());
        context.insert(
            "start_date".to_string(),
            course.start_date.format("%d-%m-%Y").to_string(),
        );
        context.insert("fee".to_string(), format_clp(course.fee));
        if let Some(reason) = &preinscription.rejection_reason {
            context.insert("reason".to_string(), reason.clone());
        }

        self.notifier
            .notify(template, person.email.as_deref(), &context);
    }
}

/// Error raised by the preinscription service.
#[derive(Debug, thiserror::Error)]
pub enum PreinscriptionError {
    #[error("preinscription {0} not found")]
    NotFound(RecordId),
    #[error("person {0} does not exist")]
    PersonNotFound(RecordId),
    #[error("course {0} does not exist")]
    CourseNotFound(RecordId),
    #[error("course {code} is not open for preinscriptions ({status})")]
    CourseClosed { code: String, status: &'static str },
    #[error(
        "person {person_id} already has active preinscription {existing} for course {course_id}"
    )]
    Duplicate {
        existing: RecordId,
        person_id: RecordId,
        course_id: RecordId,
    },
    #[error("course {code} is full ({capacity} seats confirmed)")]
    CourseFull { code: String, capacity: u32 },
    #[error("only draft preinscriptions can be deleted (current status: {0})")]
    NotDeletable(PreinscriptionStatus),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PreinscriptionError> for ApiError {
    fn from(value: PreinscriptionError) -> Self {
        match value {
            PreinscriptionError::NotFound(id) => ApiError::not_found("preinscription", id),
            PreinscriptionError::PersonNotFound(_) => {
                ValidationError::new("person_id", value.to_string()).into()
            }
            PreinscriptionError::CourseNotFound(_) => {
                ValidationError::new("course_id", value.to_string()).into()
            }
            PreinscriptionError::Duplicate { .. } => ApiError::Conflict(value.to_string()),
            PreinscriptionError::CourseClosed { .. }
            | PreinscriptionError::CourseFull { .. }
            | PreinscriptionError::NotDeletable(_)
            | PreinscriptionError::Transition(_) => ApiError::Rule(value.to_string()),
            PreinscriptionError::Repository(err) => ApiError::Repository(err),
        }
    }
}
