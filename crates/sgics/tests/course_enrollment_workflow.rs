//! End-to-end scenarios through the composed REST router: catalog seeding, people and course
//! registration, the preinscription workflow, payments, document uploads and the dashboard.

mod common {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use sgics::notifications::InMemoryMailer;
    use sgics::uploads::LocalFileStore;
    use sgics::Backend;

    static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

    pub(super) struct TestApp {
        pub(super) backend: Backend,
        pub(super) outbox: InMemoryMailer,
        pub(super) upload_dir: PathBuf,
    }

    impl TestApp {
        pub(super) fn new(upload_max_bytes: u64) -> Self {
            let upload_dir = std::env::temp_dir().join(format!(
                "sgics-it-{}-{}",
                std::process::id(),
                SEQUENCE.fetch_add(1, Ordering::SeqCst)
            ));
            let (backend, outbox) = Backend::with_outbox(
                Arc::new(LocalFileStore::new(&upload_dir)),
                upload_max_bytes,
            );
            Self {
                backend,
                outbox,
                upload_dir,
            }
        }

        fn router(&self) -> Router {
            self.backend.router()
        }

        pub(super) async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router().oneshot(request).await.expect("router responds");
            let status = response.status();
            (status, read_json_body(response).await)
        }

        pub(super) async fn raw(&self, request: Request<Body>) -> Response {
            self.router().oneshot(request).await.expect("router responds")
        }

        pub(super) async fn post(&self, uri: &str, payload: Value) -> (StatusCode, Value) {
            self.send(json_request("POST", uri, payload)).await
        }

        pub(super) async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).expect("request"))
                .await
        }

        pub(super) async fn transition(&self, id: u64, to: &str, note: Option<&str>) -> StatusCode {
            let (status, _) = self
                .post(
                    &format!("/api/v1/preinscriptions/{id}/transition"),
                    json!({ "to": to, "actor_id": 1, "note": note }),
                )
                .await;
            status
        }

        /// Region, person and published course ready for preinscriptions.
        pub(super) async fn seed(&self) -> Seed {
            let (status, region) = self
                .post(
                    "/api/v1/catalog/regions",
                    json!({ "code": "RM", "name": "Metropolitana de Santiago" }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{region}");
            let (_, province) = self
                .post(
                    "/api/v1/catalog/provinces",
                    json!({ "region_id": region["id"], "name": "Santiago" }),
                )
                .await;
            let (_, commune) = self
                .post(
                    "/api/v1/catalog/communes",
                    json!({ "province_id": province["id"], "name": "Ñuñoa" }),
                )
                .await;

            let (status, person) = self
                .post(
                    "/api/v1/people",
                    json!({
                        "rut": "12345678-5",
                        "first_names": "Javiera",
                        "last_names": "Muñoz",
                        "email": "javiera@example.cl",
                        "commune_id": commune["id"],
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{person}");

            let (status, course) = self
                .post(
                    "/api/v1/courses",
                    json!({
                        "code": "CMB-2026-01",
                        "name": "Curso Medio Básico",
                        "start_date": "2026-01-10",
                        "end_date": "2026-01-14",
                        "capacity": 1,
                        "fee": 45000,
                        "status": "published",
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{course}");

            Seed {
                person_id: person["id"].as_u64().expect("person id"),
                course_id: course["id"].as_u64().expect("course id"),
            }
        }
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.upload_dir);
        }
    }

    pub(super) struct Seed {
        pub(super) person_id: u64,
        pub(super) course_id: u64,
    }

    pub(super) fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    pub(super) async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        }
    }
}

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;

use common::{json_request, TestApp};

#[tokio::test]
async fn preinscription_is_confirmed_paid_and_reported() {
    let app = TestApp::new(1024);
    let seed = app.seed().await;

    let (status, draft) = app
        .post(
            "/api/v1/preinscriptions",
            json!({ "person_id": seed.person_id, "course_id": seed.course_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = draft["id"].as_u64().expect("preinscription id");

    for to in ["submitted", "in_review", "validated", "confirmed"] {
        assert_eq!(app.transition(id, to, None).await, StatusCode::OK, "{to}");
    }

    let (status, payment) = app
        .post(
            "/api/v1/payments",
            json!({
                "preinscription_id": id,
                "amount": 20000,
                "method": "transfer",
                "paid_on": "2025-12-01",
                "reference": "TRX-1"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "registered");

    let (_, balance) = app.get(&format!("/api/v1/payments/balance/{id}")).await;
    assert_eq!(balance["fee"], 45000);
    assert_eq!(balance["paid"], 20000);
    assert_eq!(balance["outstanding"], 25000);

    let (_, dashboard) = app
        .get(&format!("/api/v1/dashboard/courses/{}", seed.course_id))
        .await;
    assert_eq!(dashboard["confirmed"], 1);
    assert_eq!(dashboard["seats_available"], 0);
    assert_eq!(dashboard["collected"], 20000);
    assert_eq!(dashboard["outstanding"], 25000);

    let (_, summary) = app.get("/api/v1/dashboard").await;
    assert_eq!(summary["people"], 1);
    assert_eq!(summary["preinscriptions_by_status"]["confirmed"], 1);
    assert_eq!(summary["payments_collected"], 20000);

    let templates: Vec<_> = app
        .outbox
        .sent()
        .iter()
        .map(|email| email.template.key())
        .collect();
    assert_eq!(
        templates,
        vec![
            "preinscription_submitted",
            "preinscription_validated",
            "preinscription_confirmed",
            "payment_received",
        ]
    );
}

#[tokio::test]
async fn full_course_refuses_a_second_confirmation() {
    let app = TestApp::new(1024);
    let seed = app.seed().await;
    let (_, other) = app
        .post(
            "/api/v1/people",
            json!({ "rut": "11.111.111-1", "first_names": "Pedro", "last_names": "Soto" }),
        )
        .await;

    let mut ids = Vec::new();
    for person_id in [seed.person_id, other["id"].as_u64().expect("person id")] {
        let (_, draft) = app
            .post(
                "/api/v1/preinscriptions",
                json!({ "person_id": person_id, "course_id": seed.course_id }),
            )
            .await;
        let id = draft["id"].as_u64().expect("preinscription id");
        for to in ["submitted", "in_review", "validated"] {
            assert_eq!(app.transition(id, to, None).await, StatusCode::OK);
        }
        ids.push(id);
    }

    assert_eq!(app.transition(ids[0], "confirmed", None).await, StatusCode::OK);
    assert_eq!(
        app.transition(ids[1], "confirmed", None).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let (_, listed) = app
        .get(&format!(
            "/api/v1/preinscriptions?course_id={}&status=validated",
            seed.course_id
        ))
        .await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["results"][0]["id"], ids[1]);
}

#[tokio::test]
async fn rejected_preinscription_refuses_payments() {
    let app = TestApp::new(1024);
    let seed = app.seed().await;
    let (_, draft) = app
        .post(
            "/api/v1/preinscriptions",
            json!({ "person_id": seed.person_id, "course_id": seed.course_id }),
        )
        .await;
    let id = draft["id"].as_u64().expect("preinscription id");

    app.transition(id, "submitted", None).await;
    app.transition(id, "in_review", None).await;
    assert_eq!(
        app.transition(id, "rejected", None).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        app.transition(id, "rejected", Some("Falta curso inicial")).await,
        StatusCode::OK
    );

    let (status, body) = app
        .post(
            "/api/v1/payments",
            json!({ "preinscription_id": id, "amount": 1000, "method": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().expect("message").contains("rejected"));

    let (_, history) = app
        .get(&format!("/api/v1/preinscriptions/{id}/history"))
        .await;
    assert_eq!(history[2]["note"], "Falta curso inicial");
}

#[tokio::test]
async fn payments_can_be_voided_once() {
    let app = TestApp::new(1024);
    let seed = app.seed().await;
    let (_, draft) = app
        .post(
            "/api/v1/preinscriptions",
            json!({ "person_id": seed.person_id, "course_id": seed.course_id }),
        )
        .await;
    let id = draft["id"].as_u64().expect("preinscription id");
    let (_, payment) = app
        .post(
            "/api/v1/payments",
            json!({ "preinscription_id": id, "amount": 45000, "method": "card" }),
        )
        .await;
    let payment_id = payment["id"].as_u64().expect("payment id");

    let (status, body) = app
        .post(
            &format!("/api/v1/payments/{payment_id}/void"),
            json!({ "reason": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "reason");

    let (status, voided) = app
        .post(
            &format!("/api/v1/payments/{payment_id}/void"),
            json!({ "reason": "Cobro duplicado" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voided["status"], "voided");

    let (status, _) = app
        .post(
            &format!("/api/v1/payments/{payment_id}/void"),
            json!({ "reason": "Otra vez" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, balance) = app.get(&format!("/api/v1/payments/balance/{id}")).await;
    assert_eq!(balance["paid"], 0);

    let (status, _) = app.get("/api/v1/payments/balance/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = app
        .get(&format!("/api/v1/payments?preinscription_id={id}"))
        .await;
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn uploads_round_trip_over_http() {
    let app = TestApp::new(64);
    let seed = app.seed().await;

    let response = app
        .raw(
            Request::post(format!(
                "/api/v1/uploads?name=ficha%20medica.pdf&person_id={}",
                seed.person_id
            ))
            .body(Body::from("%PDF-1.4 ficha"))
            .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = common::read_json_body(response).await;
    assert_eq!(record["content_type"], "application/pdf");
    assert_eq!(record["stored_name"], "1-ficha_medica.pdf");
    let id = record["id"].as_u64().expect("upload id");

    let response = app
        .raw(
            Request::get(format!("/api/v1/uploads/{id}/content"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"%PDF-1.4 ficha");

    let (status, body) = app
        .send(
            Request::post("/api/v1/uploads?name=payload.exe")
                .body(Body::from("MZ"))
                .expect("request"),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "file");

    let (status, _) = app
        .send(
            Request::post("/api/v1/uploads?name=big.csv")
                .body(Body::from(vec![b'a'; 65]))
                .expect("request"),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .raw(
            Request::delete(format!("/api/v1/uploads/{id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/v1/uploads/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn people_are_found_by_rut_and_duplicates_conflict() {
    let app = TestApp::new(1024);
    let seed = app.seed().await;

    let (status, person) = app.get("/api/v1/people/by-rut/12.345.678-5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(person["id"], seed.person_id);
    assert_eq!(person["rut"], "12.345.678-5");

    let (status, _) = app.get("/api/v1/people/by-rut/11.111.111-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/v1/people",
            json!({ "rut": "123456785", "first_names": "Otra", "last_names": "Persona" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(json_request(
            "PATCH",
            &format!("/api/v1/courses/{}", seed.course_id),
            json!({ "status": "closed" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/v1/preinscriptions",
            json!({ "person_id": seed.person_id, "course_id": seed.course_id }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
