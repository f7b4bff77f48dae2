//! Read-only aggregates for the coordination team.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::accounts::User;
use crate::courses::{Course, CourseStatus};
use crate::error::ApiError;
use crate::payments::{Balance, Payment};
use crate::people::Person;
use crate::preinscriptions::{Preinscription, PreinscriptionStatus};
use crate::records::{RecordId, Repository, RepositoryError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    pub course_id: RecordId,
    pub code: String,
    pub name: String,
    pub capacity: u32,
    pub confirmed: usize,
    pub seats_available: u32,
    pub pending_review: usize,
    pub collected: u64,
    pub outstanding: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub people: usize,
    pub users: usize,
    pub courses_by_status: BTreeMap<CourseStatus, usize>,
    pub preinscriptions_by_status: BTreeMap<PreinscriptionStatus, usize>,
    pub payments_collected: u64,
    pub courses: Vec<CourseSummary>,
}

#[derive(Clone)]
pub struct Dashboard {
    people: Arc<dyn Repository<Person>>,
    users: Arc<dyn Repository<User>>,
    courses: Arc<dyn Repository<Course>>,
    preinscriptions: Arc<dyn Repository<Preinscription>>,
    payments: Arc<dyn Repository<Payment>>,
}

impl Dashboard {
    pub fn new(
        people: Arc<dyn Repository<Person>>,
        users: Arc<dyn Repository<User>>,
        courses: Arc<dyn Repository<Course>>,
        preinscriptions: Arc<dyn Repository<Preinscription>>,
        payments: Arc<dyn Repository<Payment>>,
    ) -> Self {
        Self {
            people,
            users,
            courses,
            preinscriptions,
            payments,
        }
    }

    pub fn summary(&self) -> Result<DashboardSummary, RepositoryError> {
        let courses = self.courses.list()?;
        let preinscriptions = self.preinscriptions.list()?;
        let payments = self.payments.list()?;

        let mut courses_by_status: BTreeMap<CourseStatus, usize> = CourseStatus::ordered()
            .into_iter()
            .map(|status| (status, 0))
            .collect();
        for course in &courses {
            *courses_by_status.entry(course.status).or_default() += 1;
        }

        let mut preinscriptions_by_status: BTreeMap<PreinscriptionStatus, usize> =
            PreinscriptionStatus::ordered()
                .into_iter()
                .map(|status| (status, 0))
                .collect();
        for preinscription in &preinscriptions {
            *preinscriptions_by_status
                .entry(preinscription.status)
                .or_default() += 1;
        }

        let payments_collected = payments
            .iter()
            .filter(|payment| payment.counts())
            .fold(0u64, |total, payment| total.saturating_add(payment.amount));

        let courses = courses
            .iter()
            .map(|course| summarize_course(course, &preinscriptions, &payments))
            .collect();

        Ok(DashboardSummary {
            people: self.people.list()?.len(),
            users: self.users.list()?.len(),
            courses_by_status,
            preinscriptions_by_status,
            payments_collected,
            courses,
        })
    }

    pub fn course(&self, id: RecordId) -> Result<Option<CourseSummary>, RepositoryError> {
        let Some(course) = self.courses.fetch(id)? else {
            return Ok(None);
        };
        Ok(Some(summarize_course(
            &course,
            &self.preinscriptions.list()?,
            &self.payments.list()?,
        )))
    }
}

/// Only validated and confirmed preinscriptions owe the fee.
fn summarize_course(
    course: &Course,
    preinscriptions: &[Preinscription],
    payments: &[Payment],
) -> CourseSummary {
    let enrolled: Vec<&Preinscription> = preinscriptions
        .iter()
        .filter(|preinscription| preinscription.course_id == course.id)
        .collect();

    let confirmed = enrolled
        .iter()
        .filter(|preinscription| preinscription.status == PreinscriptionStatus::Confirmed)
        .count();
    let pending_review = enrolled
        .iter()
        .filter(|preinscription| {
            matches!(
                preinscription.status,
                PreinscriptionStatus::Submitted | PreinscriptionStatus::InReview
            )
        })
        .count();

    let mut collected = 0u64;
    let mut outstanding = 0u64;
    for preinscription in &enrolled {
        let balance = Balance::compute(preinscription.id, course.fee, payments);
        collected = collected.saturating_add(balance.paid);
        if matches!(
            preinscription.status,
            PreinscriptionStatus::Validated | PreinscriptionStatus::Confirmed
        ) {
            outstanding = outstanding.saturating_add(balance.outstanding);
        }
    }

    let confirmed_seats = u32::try_from(confirmed).unwrap_or(u32::MAX);
    CourseSummary {
        course_id: course.id,
        code: course.code.clone(),
        name: course.name.clone(),
        capacity: course.capacity,
        confirmed,
        seats_available: course.capacity.saturating_sub(confirmed_seats),
        pending_review,
        collected,
        outstanding,
    }
}

pub fn dashboard_router(dashboard: Dashboard) -> Router {
    Router::new()
        .route("/api/v1/dashboard", get(summary_handler))
        .route("/api/v1/dashboard/courses/:id", get(course_handler))
        .with_state(dashboard)
}

pub(crate) async fn summary_handler(
    State(dashboard): State<Dashboard>,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(dashboard.summary()?))
}

pub(crate) async fn course_handler(
    State(dashboard): State<Dashboard>,
    Path(id): Path<RecordId>,
) -> Result<Json<CourseSummary>, ApiError> {
    dashboard
        .course(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("course", id))
}
