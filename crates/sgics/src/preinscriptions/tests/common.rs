use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::courses::{Course, CourseStatus};
use crate::notifications::{InMemoryMailer, Notifier};
use crate::people::Person;
use crate::preinscriptions::{
    NewPreinscription, Preinscription, PreinscriptionService, PreinscriptionStatus,
    TransitionRequest,
};
use crate::records::{InMemoryRepository, RecordId, Repository};
use crate::rut::Rut;

pub(super) struct Fixture {
    pub(super) service: Arc<PreinscriptionService>,
    pub(super) people: Arc<InMemoryRepository<Person>>,
    pub(super) courses: Arc<InMemoryRepository<Course>>,
    pub(super) mailer: InMemoryMailer,
    pub(super) person_id: RecordId,
    pub(super) course_id: RecordId,
}

impl Fixture {
    pub(super) fn add_person(&self, body: u32) -> RecordId {
        self.people.insert(person(body)).expect("person stored").id
    }

    pub(super) fn add_course(&self, code: &str, capacity: u32, status: CourseStatus) -> RecordId {
        self.courses
            .insert(course(code, capacity, status))
            .expect("course stored")
            .id
    }

    pub(super) fn open(&self, person_id: RecordId, course_id: RecordId) -> Preinscription {
        self.service
            .create(NewPreinscription {
                person_id,
                course_id,
                notes: None,
            })
            .expect("preinscription opened")
    }

    /// Walk a preinscription through `path`, panicking on the first refused step.
    pub(super) fn advance(&self, id: RecordId, path: &[PreinscriptionStatus]) -> Preinscription {
        let mut current = self.service.get(id).expect("preinscription exists");
        for status in path {
            current = self
                .service
                .transition(id, request(*status, None))
                .unwrap_or_else(|err| panic!("transition to {status} failed: {err}"));
        }
        current
    }
}

pub(super) fn fixture() -> Fixture {
    let preinscriptions = Arc::new(InMemoryRepository::<Preinscription>::new());
    let people = Arc::new(InMemoryRepository::<Person>::new());
    let courses = Arc::new(InMemoryRepository::<Course>::new());
    let mailer = InMemoryMailer::default();
    let notifier = Notifier::new(Arc::new(mailer.clone()), "cursos@scouts.cl");

    let service = Arc::new(PreinscriptionService::new(
        preinscriptions,
        people.clone(),
        courses.clone(),
        notifier,
    ));

    let person_id = people.insert(person(12_345_678)).expect("person stored").id;
    let course_id = courses
        .insert(course("CMB-2026-01", 2, CourseStatus::Published))
        .expect("course stored")
        .id;

    Fixture {
        service,
        people,
        courses,
        mailer,
        person_id,
        course_id,
    }
}

pub(super) fn person(body: u32) -> Person {
    Person {
        id: 0,
        rut: Rut::from_body(body).expect("valid rut body"),
        first_names: "Olave".to_string(),
        last_names: "Soames".to_string(),
        email: Some(format!("persona{body}@scouts.cl")),
        phone: None,
        birth_date: None,
        commune_id: None,
        group_id: None,
        branch_id: None,
        active: true,
    }
}

pub(super) fn course(code: &str, capacity: u32, status: CourseStatus) -> Course {
    Course {
        id: 0,
        code: code.to_string(),
        name: "Curso Medio Básico".to_string(),
        description: String::new(),
        start_date: NaiveDate::from_ymd_opt(2026, 1, 10).expect("valid date"),
        end_date: NaiveDate::from_ymd_opt(2026, 1, 14).expect("valid date"),
        capacity,
        fee: 45_000,
        status,
        coordinator_id: None,
    }
}

pub(super) fn request(to: PreinscriptionStatus, note: Option<&str>) -> TransitionRequest {
    TransitionRequest {
        to,
        actor_id: Some(7),
        note: note.map(str::to_string),
    }
}

pub(super) fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) const TO_VALIDATED: [PreinscriptionStatus; 3] = [
    PreinscriptionStatus::Submitted,
    PreinscriptionStatus::InReview,
    PreinscriptionStatus::Validated,
];

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
