use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{fixture, read_json_body, Fixture};
use crate::preinscriptions::preinscription_router;

fn router(fixture: &Fixture) -> Router {
    preinscription_router(fixture.service.clone())
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_then_transition_over_http() {
    let fixture = fixture();

    let response = router(&fixture)
        .oneshot(post_json(
            "/api/v1/preinscriptions",
            json!({ "person_id": fixture.person_id, "course_id": fixture.course_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_u64().unwrap();

    let response = router(&fixture)
        .oneshot(post_json(
            &format!("/api/v1/preinscriptions/{id}/transition"),
            json!({ "to": "submitted", "actor_id": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let submitted = read_json_body(response).await;
    assert_eq!(submitted["status"], "submitted");
    assert!(submitted["submitted_at"].is_string());

    let response = router(&fixture)
        .oneshot(get(&format!("/api/v1/preinscriptions/{id}/history")))
        .await
        .unwrap();
    let history = read_json_body(response).await;
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["from"], "draft");
    assert_eq!(history[0]["actor_id"], 3);

    let response = router(&fixture)
        .oneshot(get(&format!("/api/v1/preinscriptions/{id}/transitions")))
        .await
        .unwrap();
    let transitions = read_json_body(response).await;
    assert_eq!(transitions["allowed"], json!(["in_review", "cancelled"]));
}

#[tokio::test]
async fn invalid_transition_is_unprocessable() {
    let fixture = fixture();
    let draft = fixture.open(fixture.person_id, fixture.course_id);

    let response = router(&fixture)
        .oneshot(post_json(
            &format!("/api/v1/preinscriptions/{}/transition", draft.id),
            json!({ "to": "confirmed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("from draft to confirmed"));
}

#[tokio::test]
async fn duplicate_preinscription_conflicts() {
    let fixture = fixture();
    fixture.open(fixture.person_id, fixture.course_id);

    let response = router(&fixture)
        .oneshot(post_json(
            "/api/v1/preinscriptions",
            json!({ "person_id": fixture.person_id, "course_id": fixture.course_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_course_reports_the_field() {
    let fixture = fixture();

    let response = router(&fixture)
        .oneshot(post_json(
            "/api/v1/preinscriptions",
            json!({ "person_id": fixture.person_id, "course_id": 77 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["field"], "course_id");
}

#[tokio::test]
async fn list_filters_by_status_and_paginates() {
    let fixture = fixture();
    let other = fixture.add_person(11_111_111);
    let first = fixture.open(fixture.person_id, fixture.course_id);
    fixture.open(other, fixture.course_id);
    fixture.advance(first.id, &[crate::preinscriptions::PreinscriptionStatus::Submitted]);

    let response = router(&fixture)
        .oneshot(get("/api/v1/preinscriptions?status=draft"))
        .await
        .unwrap();
    let page = read_json_body(response).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["person_id"], other);

    let response = router(&fixture)
        .oneshot(get(&format!(
            "/api/v1/preinscriptions?course_id={}&limit=1&offset=1",
            fixture.course_id
        )))
        .await
        .unwrap();
    let page = read_json_body(response).await;
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn workflow_and_missing_records() {
    let fixture = fixture();

    let response = router(&fixture)
        .oneshot(get("/api/v1/preinscriptions/workflow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let steps = read_json_body(response).await;
    assert_eq!(steps.as_array().map(Vec::len), Some(7));
    assert_eq!(steps[0]["status"], "draft");

    let response = router(&fixture)
        .oneshot(get("/api/v1/preinscriptions/999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router(&fixture)
        .oneshot(
            Request::delete("/api/v1/preinscriptions/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
