use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use rsvp_api::{app, state::{AppState, AuthConfig}};
use rsvp_core::{Collection, DataStore, MemoryGuestCache, MemoryStore, NoopNotifier, ReservationModel};
use rsvp_registry::EventDetails;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

fn test_app(model: ReservationModel) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        Arc::new(MemoryGuestCache::new()),
        Arc::new(NoopNotifier),
        EventDetails {
            date: "April 20, 2024".to_string(),
            time: "2:00 PM".to_string(),
            location: "Gromadzka 63/5".to_string(),
            rsvp_base_url: "http://localhost:3000".to_string(),
        },
        model,
        AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 3600,
        },
    );

    TestApp { router: app(state), store }
}

impl TestApp {
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
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn session(&self) -> String {
        let (status, body) = self.send(Method::POST, "/v1/sessions", None, None).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn rsvp(&self, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, "/v1/rsvp", Some(token), Some(body)).await
    }

    async fn attending_guest(&self, name: &str) -> (String, Uuid) {
        let token = self.session().await;
        let (status, guest) = self.rsvp(&token, json!({ "name": name, "companions": 1, "status": "attending" })).await;
        assert_eq!(status, StatusCode::OK);
        let id = guest["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    async fn add_gift(&self, name: &str) -> Uuid {
        let row = self.store.insert(Collection::Gifts, json!({ "name": name })).await.unwrap();
        row["id"].as_str().unwrap().parse().unwrap()
    }
}

fn reservation_uri(gift_id: Uuid) -> String {
    format!("/v1/gifts/{}/reservation", gift_id)
}

#[tokio::test]
async fn test_session_token_required() {
    let app = test_app(ReservationModel::Column);

    let (status, body) = app.send(Method::GET, "/v1/gifts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = app.send(Method::GET, "/v1/gifts", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rsvp_round_trip() {
    let app = test_app(ReservationModel::Column);
    let token = app.session().await;

    let (status, _) = app.send(Method::GET, "/v1/guests/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, guest) = app.rsvp(&token, json!({ "name": "Anna Nowak", "companions": 2, "status": "attending" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guest["name"], "Anna Nowak");
    assert_eq!(guest["companions"], 2);
    assert_eq!(guest["status"], "attending");

    let (status, me) = app.send(Method::GET, "/v1/guests/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], guest["id"]);

    let uri = format!("/v1/guests/{}", guest["id"].as_str().unwrap());
    let (status, fetched) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Anna Nowak");

    let (status, body) = app.send(Method::GET, &format!("/v1/guests/{}", Uuid::new_v4()), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "guest_not_found");
}

#[tokio::test]
async fn test_rsvp_validation_errors() {
    let app = test_app(ReservationModel::Column);
    let token = app.session().await;

    let (status, body) = app.rsvp(&token, json!({ "name": "A", "companions": 0, "status": "attending" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = app.rsvp(&token, json!({ "name": "Anna Nowak", "companions": 6, "status": "attending" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.rsvp(&token, json!({ "name": "Anna Nowak", "status": "pending" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reservation_conflict_and_ownership() {
    for model in [ReservationModel::Column, ReservationModel::JoinTable] {
        let app = test_app(model);
        let gift = app.add_gift("Stroller").await;
        let (anna, anna_id) = app.attending_guest("Anna Nowak").await;
        let (piotr, piotr_id) = app.attending_guest("Piotr Kowalski").await;

        let (status, body) = app.send(Method::PUT, &reservation_uri(gift), Some(&anna), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "created");
        assert_eq!(body["guest_id"], json!(anna_id));

        let (status, body) = app.send(Method::PUT, &reservation_uri(gift), Some(&anna), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_held");

        let (status, body) = app.send(Method::PUT, &reservation_uri(gift), Some(&piotr), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_reserved");

        let (status, body) = app.send(Method::DELETE, &reservation_uri(gift), Some(&piotr), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "not_owner");

        let (status, body) = app.send(Method::DELETE, &reservation_uri(gift), Some(&anna), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "released");

        let (status, body) = app.send(Method::PUT, &reservation_uri(gift), Some(&piotr), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["guest_id"], json!(piotr_id));
    }
}

#[tokio::test]
async fn test_not_attending_guest_cannot_reserve() {
    let app = test_app(ReservationModel::Column);
    let gift = app.add_gift("Bath tub").await;
    let token = app.session().await;

    let (status, _) = app.rsvp(&token, json!({ "name": "Ewa Lis", "status": "not_attending" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::PUT, &reservation_uri(gift), Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_attending");
}

#[tokio::test]
async fn test_registry_requires_a_guest() {
    let app = test_app(ReservationModel::Column);
    let gift = app.add_gift("Crib").await;
    let token = app.session().await;

    let (status, body) = app.send(Method::PUT, &reservation_uri(gift), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    // Browsing works without a guest
    let (status, gifts) = app.send(Method::GET, "/v1/gifts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gifts[0]["availability"], "available");
}

#[tokio::test]
async fn test_unknown_gift_is_not_found() {
    let app = test_app(ReservationModel::JoinTable);
    let (token, _) = app.attending_guest("Anna Nowak").await;

    let (status, body) = app.send(Method::PUT, &reservation_uri(Uuid::new_v4()), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "gift_not_found");
}

#[tokio::test]
async fn test_registry_view_focuses_on_own_reservation() {
    let app = test_app(ReservationModel::Column);
    let crib = app.add_gift("Crib").await;
    app.add_gift("Mobile").await;
    let (token, _) = app.attending_guest("Anna Nowak").await;

    let (status, view) = app.send(Method::GET, "/v1/registry", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["view"], "full");
    assert_eq!(view["gifts"].as_array().unwrap().len(), 2);

    app.send(Method::PUT, &reservation_uri(crib), Some(&token), None).await;

    let (status, view) = app.send(Method::GET, "/v1/registry", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["view"], "focused");
    assert_eq!(view["gift"]["id"], json!(crib));
    assert_eq!(view["gift"]["availability"], "reserved_by_me");
}

#[tokio::test]
async fn test_new_session_recovers_guest_by_id() {
    let app = test_app(ReservationModel::JoinTable);
    let gift = app.add_gift("High chair").await;
    let (old_token, guest_id) = app.attending_guest("Anna Nowak").await;
    app.send(Method::PUT, &reservation_uri(gift), Some(&old_token), None).await;

    // Fresh session, empty cache; the store still knows the holder
    let token = app.session().await;
    let uri = format!("/v1/gifts?guest_id={}", guest_id);
    let (status, gifts) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gifts[0]["availability"], "reserved_by_me");

    let (status, gifts) = app.send(Method::GET, "/v1/gifts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gifts[0]["availability"], "reserved_by_other");

    // Reopening the RSVP from the new session keeps the existing record
    let (status, guest) = app.rsvp(&token, json!({ "guest_id": guest_id, "companions": 0, "status": "not_attending" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guest["id"], json!(guest_id));
    assert_eq!(guest["name"], "Anna Nowak");

    let (_, gifts) = app.send(Method::GET, "/v1/gifts", Some(&token), None).await;
    assert_eq!(gifts[0]["availability"], "available");
}

#[tokio::test]
async fn test_mutations_ignore_guest_id_override() {
    for model in [ReservationModel::Column, ReservationModel::JoinTable] {
        let app = test_app(model);
        let gift = app.add_gift("Stroller").await;
        let (anna, anna_id) = app.attending_guest("Anna Nowak").await;
        let (piotr, _) = app.attending_guest("Piotr Kowalski").await;

        let (status, _) = app.send(Method::PUT, &reservation_uri(gift), Some(&anna), None).await;
        assert_eq!(status, StatusCode::OK);

        // Piotr's session cannot act as Anna by naming her id
        let uri = format!("{}?guest_id={}", reservation_uri(gift), anna_id);
        let (status, body) = app.send(Method::DELETE, &uri, Some(&piotr), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "not_owner");

        let list_uri = format!("/v1/gifts?guest_id={}", anna_id);
        let (_, gifts) = app.send(Method::GET, &list_uri, Some(&piotr), None).await;
        assert_eq!(gifts[0]["availability"], "reserved_by_me");

        // A session with no guest of its own gets nothing from the override either
        let stranger = app.session().await;
        let (status, body) = app.send(Method::PUT, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }
}
