//! HTTP tests driving the router with in-process requests

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Library;
use library_server::{
    api,
    config::AppConfig,
    models::user::{Role, UserClaims},
    AppState,
};

const SECRET: &str = "test-secret";

struct TestApp {
    lib: Library,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let lib = Library::new();
        let mut config = AppConfig::default();
        config.auth.jwt_secret = SECRET.to_string();
        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(lib.services.clone()),
        };
        Self {
            router: api::router(state),
            lib,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn token(user_id: i32, role: Role) -> String {
    let now = chrono::Utc::now().timestamp();
    UserClaims {
        sub: format!("user-{}", user_id),
        user_id,
        roles: vec![role],
        exp: now + 3600,
        iat: now,
    }
    .create_token(SECRET)
    .unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/materials", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let forged = UserClaims::from_token(&token(1, Role::Librarian), SECRET)
        .unwrap()
        .create_token("another-secret")
        .unwrap();
    let (status, _) = app.send(Method::GET, "/api/v1/materials", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_loan_lifecycle_over_http() {
    let app = TestApp::new();
    let librarian = token(100, Role::Librarian);

    let (status, user) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&librarian),
            Some(json!({ "name": "Ana", "roles": ["student"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let ana_id = user["id"].as_i64().unwrap() as i32;
    let ana = token(ana_id, Role::Student);

    // Patrons cannot edit the catalog
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/materials",
            Some(&ana),
            Some(json!({ "title": "Clean Code", "material_type": "book" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, material) = app
        .send(
            Method::POST,
            "/api/v1/materials",
            Some(&librarian),
            Some(json!({ "title": "Clean Code", "material_type": "book", "authors": ["Robert C. Martin"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let material_id = material["id"].as_i64().unwrap();

    let (status, copy) = app
        .send(
            Method::POST,
            &format!("/api/v1/materials/{}/copies", material_id),
            Some(&librarian),
            Some(json!({ "code": "CC-001" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["status"], "available");
    assert_eq!(copy["format"], "physical");

    let (status, request) = app
        .send(
            Method::POST,
            "/api/v1/loan-requests",
            Some(&ana),
            Some(json!({ "material_id": material_id, "days": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/loan-requests",
            Some(&librarian),
            Some(json!({ "material_id": material_id, "user_id": ana_id, "days": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "NoAvailableCopy");

    let approve = format!("/api/v1/loan-requests/{}/approve", request_id);
    let (status, _) = app.send(Method::POST, &approve, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, loan) = app.send(Method::POST, &approve, Some(&librarian), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "active");
    let loan_id = loan["id"].as_i64().unwrap();

    let (status, availability) = app
        .send(
            Method::GET,
            &format!("/api/v1/materials/{}/availability", material_id),
            Some(&ana),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(availability["loaned"], 1);

    // Another patron can neither see nor return Ana's loan
    let stranger = token(ana_id + 1, Role::Student);
    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/loans/{}", loan_id), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/loans?user_id={}", ana_id), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, loans) = app.send(Method::GET, "/api/v1/loans", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans.as_array().unwrap().len(), 0);

    // Nine days late
    app.lib.clock.advance_days(16);
    let (status, outcome) = app
        .send(Method::POST, &format!("/api/v1/loans/{}/return", loan_id), Some(&ana), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["loan"]["status"], "returned");
    assert_eq!(outcome["fine"]["days_late"], 9);
    assert_eq!(outcome["fine"]["status"], "pending");
    assert!(outcome["hold"].is_null());
    let fine_id = outcome["fine"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/loan-requests",
            Some(&ana),
            Some(json!({ "material_id": material_id, "days": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "FineBlocked");

    let (status, fines) = app.send(Method::GET, "/api/v1/fines?status=pending", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fines.as_array().unwrap().len(), 1);

    let pay = format!("/api/v1/fines/{}/pay", fine_id);
    let (status, _) = app.send(Method::POST, &pay, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, fine) = app.send(Method::POST, &pay, Some(&librarian), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fine["status"], "paid");
    let (status, body) = app.send(Method::POST, &pay, Some(&librarian), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidState");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/loan-requests",
            Some(&ana),
            Some(json!({ "material_id": material_id, "days": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reservation_flow_over_http() {
    let app = TestApp::new();
    let librarian = token(100, Role::Librarian);
    let ana_user = app.lib.user("Ana", Role::Student).await;
    let luis_user = app.lib.user("Luis", Role::Professor).await;
    let ana = token(ana_user.id, Role::Student);
    let luis = token(luis_user.id, Role::Professor);
    let material = app.lib.material("Clean Code").await;
    let copy = app.lib.copy(material.id, "CC-001").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/reservations",
            Some(&luis),
            Some(json!({ "material_id": material.id })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "NoLoanedCopy");

    let request = app
        .lib
        .services
        .circulation
        .request_loan(material.id, ana_user.id, 7)
        .await
        .unwrap();
    let loan = app.lib.services.circulation.approve_loan(request.id).await.unwrap();

    let (status, reservation) = app
        .send(
            Method::POST,
            "/api/v1/reservations",
            Some(&luis),
            Some(json!({ "material_id": material.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["copy_id"], copy.id);
    let reservation_id = reservation["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/reservations",
            Some(&luis),
            Some(json!({ "material_id": material.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateReservation");

    let (status, queue) = app
        .send(Method::GET, &format!("/api/v1/copies/{}/queue", copy.id), Some(&librarian), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, outcome) = app
        .send(Method::POST, &format!("/api/v1/loans/{}/return", loan.id), Some(&librarian), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["hold"]["id"], reservation_id);
    assert_eq!(app.lib.copy_status(copy.id).await, library_server::models::CopyStatus::Reserved);

    let claim = format!("/api/v1/reservations/{}/claim", reservation_id);
    let (status, body) = app.send(Method::POST, &claim, Some(&ana), Some(json!({ "days": 7 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidState");
    let (status, _) = app
        .send(
            Method::POST,
            &claim,
            Some(&ana),
            Some(json!({ "days": 7, "user_id": luis_user.id })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // A librarian claims for the holder only when naming them
    let (status, _) = app.send(Method::POST, &claim, Some(&librarian), Some(json!({ "days": 7 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, pickup) = app.send(Method::POST, &claim, Some(&luis), Some(json!({ "days": 7 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pickup["copy_id"], copy.id);
    assert_eq!(pickup["status"], "pending");

    let (status, reservations) = app
        .send(Method::GET, "/api/v1/reservations?status=completed", Some(&luis), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reservations.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_copy_status_edit_and_lookup() {
    let app = TestApp::new();
    let librarian = token(100, Role::Librarian);
    let material = app.lib.material("Clean Code").await;
    let copy = app.lib.copy(material.id, "CC-001").await;

    let (status, found) = app
        .send(Method::GET, "/api/v1/copies?code=CC-001", Some(&librarian), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], copy.id);

    let status_uri = format!("/api/v1/copies/{}/status", copy.id);
    let (status, body) = app
        .send(Method::PUT, &status_uri, Some(&librarian), Some(json!({ "status": "loaned" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidState");

    let (status, damaged) = app
        .send(Method::PUT, &status_uri, Some(&librarian), Some(json!({ "status": "damaged" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(damaged["status"], "damaged");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/materials/{}", material.id), Some(&librarian), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/copies/{}", copy.id), Some(&librarian), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_management_is_librarian_only() {
    let app = TestApp::new();
    let librarian = token(100, Role::Librarian);
    let ana_user = app.lib.user("Ana", Role::Student).await;
    let ana = token(ana_user.id, Role::Student);
    let user_uri = format!("/api/v1/users/{}", ana_user.id);

    let (status, _) = app.send(Method::GET, "/api/v1/users", Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::PUT, &user_uri, Some(&ana), Some(json!({ "roles": ["librarian"] })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = app.send(Method::GET, "/api/v1/users?search=an", Some(&librarian), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["name"], "Ana");

    let (status, updated) = app
        .send(
            Method::PUT,
            &user_uri,
            Some(&librarian),
            Some(json!({ "email": "ana@uni.edu", "roles": ["student", "librarian"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["email"], "ana@uni.edu");
    assert_eq!(updated["roles"], json!(["student", "librarian"]));

    let (status, _) = app.send(Method::DELETE, &user_uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &user_uri, Some(&librarian), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &user_uri, Some(&librarian), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_material_listing_over_http() {
    let app = TestApp::new();
    let ana = token(1, Role::Student);
    let shelved = app.lib.material("Clean Code").await;
    app.lib.copy(shelved.id, "CC-001").await;
    app.lib.material("No copies yet").await;

    let (status, all) = app.send(Method::GET, "/api/v1/materials", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["title"], "Clean Code");
    assert_eq!(all[0]["availability"]["available"], 1);

    let (status, circulating) = app
        .send(Method::GET, "/api/v1/materials?available_only=true", Some(&ana), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(circulating.as_array().unwrap().len(), 1);
    assert_eq!(circulating[0]["id"], shelved.id);
}
