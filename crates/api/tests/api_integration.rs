//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use document_store::InMemoryDocumentStore;
use domain::{NewAccount, TokenSigner};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

type State = Arc<api::AppState<InMemoryDocumentStore>>;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, State) {
    let signer = TokenSigner::new(
        SecretString::from("integration-secret".to_string()),
        Duration::days(30),
    );
    let state = api::create_state(InMemoryDocumentStore::new(), signer);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &axum::Router, email: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Test User", "email": email, "password": "secret123"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &axum::Router, state: &State) -> String {
    state
        .auth
        .create_admin(NewAccount::new("Admin", "admin@example.com", "adminpass"))
        .await
        .unwrap();

    let (status, json) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "admin@example.com", "password": "adminpass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["token"].as_str().unwrap().to_string()
}

fn shipment_body(amount: f64) -> Value {
    json!({
        "source": {"address": "1 Dock Rd", "city": "Oakland", "state": "CA", "country": "US"},
        "destination": {"address": "9 Pier St", "city": "Denver", "state": "CO", "country": "US"},
        "packageDetails": {"weight": 2.5, "dimensions": {"length": 10, "width": 5, "height": 4}},
        "shipmentType": "express",
        "amount": amount
    })
}

async fn create_shipment(app: &axum::Router, token: &str, amount: f64) -> Value {
    let (status, json) = send(
        app,
        "POST",
        "/api/shipments",
        Some(token),
        Some(shipment_body(amount)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"].clone()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
}

#[tokio::test]
async fn test_register_login_and_me() {
    let (app, _) = setup();
    register(&app, "ada@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "secret123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let token = json["token"].as_str().unwrap();

    let (status, json) = send(&app, "GET", "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "ada@example.com");
    assert_eq!(json["data"]["role"], "user");
    assert!(json["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_login_failures() {
    let (app, _) = setup();
    register(&app, "ada@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({"success": false, "message": "Invalid credentials"}));

    let (status, json) = send(&app, "POST", "/api/auth/login", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Please provide an email and password");
}

#[tokio::test]
async fn test_duplicate_registration() {
    let (app, _) = setup();
    register(&app, "ada@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "secret123"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Duplicate field value entered");
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let (app, _) = setup();

    for token in [None, Some("garbage")] {
        let (status, json) = send(&app, "GET", "/api/shipments", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            json,
            json!({"success": false, "message": "Not authorized to access this route"})
        );
    }
}

#[tokio::test]
async fn test_create_shipment_defaults() {
    let (app, _) = setup();
    let token = register(&app, "ada@example.com").await;

    let mut body = shipment_body(42.0);
    body["status"] = json!("delivered");
    body["paymentStatus"] = json!("successful");
    body["trackingId"] = json!("HIJACKED");
    let (status, json) = send(&app, "POST", "/api/shipments", Some(&token), Some(body)).await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &json["data"];
    assert_eq!(data["status"], "order-received");
    assert_eq!(data["paymentStatus"], "pending");
    assert_eq!(data["updatedStatus"], json!([]));
    let tracking_id = data["trackingId"].as_str().unwrap();
    assert_eq!(tracking_id.len(), 8);
    assert_ne!(tracking_id, "HIJACKED");
    assert_eq!(tracking_id, tracking_id.to_uppercase());
}

#[tokio::test]
async fn test_create_shipment_validation() {
    let (app, _) = setup();
    let token = register(&app, "ada@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/shipments",
        Some(&token),
        Some(json!({"shipmentType": "express"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("Please provide package weight")
    );

    for (field, value) in [("status", "teleported"), ("paymentStatus", "refunded")] {
        let mut body = shipment_body(10.0);
        body[field] = json!(value);
        let (status, json) = send(&app, "POST", "/api/shipments", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{field}");
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains(value));
    }
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let (app, _) = setup();
    let token = register(&app, "ada@example.com").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shipments")
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ownership_check() {
    let (app, state) = setup();
    let owner = register(&app, "owner@example.com").await;
    let stranger = register(&app, "stranger@example.com").await;
    let admin = admin_token(&app, &state).await;

    let shipment = create_shipment(&app, &owner, 10.0).await;
    let uri = format!("/api/shipments/{}", shipment["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .ends_with("is not authorized to access this shipment")
    );
}

#[tokio::test]
async fn test_list_own_shipments() {
    let (app, _) = setup();
    let ada = register(&app, "ada@example.com").await;
    let bob = register(&app, "bob@example.com").await;

    create_shipment(&app, &ada, 1.0).await;
    create_shipment(&app, &ada, 2.0).await;
    create_shipment(&app, &bob, 3.0).await;

    let (status, json) = send(&app, "GET", "/api/shipments", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"][0]["amount"], 1.0);
    assert_eq!(json["data"][1]["amount"], 2.0);
}

#[tokio::test]
async fn test_get_unknown_or_invalid_id() {
    let (app, _) = setup();
    let token = register(&app, "ada@example.com").await;

    let (status, json) = send(&app, "GET", "/api/shipments/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);

    let uri = "/api/shipments/00000000-0000-4000-8000-000000000000";
    let (status, json) = send(&app, "GET", uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .starts_with("Shipment not found with id of")
    );
}

#[tokio::test]
async fn test_public_tracking() {
    let (app, _) = setup();
    let token = register(&app, "ada@example.com").await;
    let shipment = create_shipment(&app, &token, 99.0).await;
    let tracking_id = shipment["trackingId"].as_str().unwrap();

    let uri = format!("/api/shipments/track/{tracking_id}");
    let (status, json) = send(&app, "GET", &uri, None, None).await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["trackingId"], tracking_id);
    assert_eq!(data["status"], "order-received");
    assert_eq!(data["payment"], "pending");
    assert_eq!(data["source"]["city"], "Oakland");
    assert!(data.get("amount").is_none());
    assert!(data.get("packageDetails").is_none());
    assert!(data.get("user").is_none());

    let (status, json) = send(&app, "GET", "/api/shipments/track/NOPE1234", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let (app, _) = setup();
    let token = register(&app, "ada@example.com").await;

    let (status, json) = send(&app, "GET", "/api/admin/shipments", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "Not authorized to access this route");

    let (status, _) = send(&app, "GET", "/api/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_status_update() {
    let (app, state) = setup();
    let user = register(&app, "ada@example.com").await;
    let admin = admin_token(&app, &state).await;
    let shipment = create_shipment(&app, &user, 10.0).await;
    let uri = format!(
        "/api/admin/shipments/{}/status",
        shipment["id"].as_str().unwrap()
    );

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({"status": "in-transit"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "in-transit");
    assert_eq!(json["data"]["updatedStatus"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["updatedStatus"][0]["shipment"], "in-transit");

    let (status, json) = send(&app, "PUT", &uri, Some(&admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Please provide a status");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({"status": "teleported"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_payment_and_amount_updates() {
    let (app, state) = setup();
    let user = register(&app, "ada@example.com").await;
    let admin = admin_token(&app, &state).await;
    let shipment = create_shipment(&app, &user, 10.0).await;
    let id = shipment["id"].as_str().unwrap();

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/admin/shipments/{id}/payment"),
        Some(&admin),
        Some(json!({"paymentStatus": "successful"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["paymentStatus"], "successful");
    assert_eq!(json["data"]["updatedStatus"], json!([]));

    let amount_uri = format!("/api/admin/shipments/{id}/amount");
    let (status, json) = send(
        &app,
        "PUT",
        &amount_uri,
        Some(&admin),
        Some(json!({"amount": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["amount"], 0.0);

    let (status, json) = send(
        &app,
        "PUT",
        &amount_uri,
        Some(&admin),
        Some(json!({"amount": -5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Please provide a valid amount");
}

#[tokio::test]
async fn test_admin_delete() {
    let (app, state) = setup();
    let user = register(&app, "ada@example.com").await;
    let admin = admin_token(&app, &state).await;
    let shipment = create_shipment(&app, &user, 10.0).await;
    let uri = format!("/api/admin/shipments/{}", shipment["id"].as_str().unwrap());

    let (status, json) = send(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true}));

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_listing_with_filters_and_pagination() {
    let (app, state) = setup();
    let user = register(&app, "ada@example.com").await;
    let admin = admin_token(&app, &state).await;

    for amount in 0..12 {
        create_shipment(&app, &user, amount as f64).await;
    }

    let (status, json) = send(
        &app,
        "GET",
        "/api/admin/shipments?amount%5Bgte%5D=2&sort=amount&page=2&limit=4&select=amount,trackingId",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 4);
    assert_eq!(json["pagination"]["next"], json!({"page": 3, "limit": 4}));
    assert_eq!(json["pagination"]["prev"], json!({"page": 1, "limit": 4}));

    let amounts: Vec<f64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["amount"].as_f64().unwrap())
        .collect();
    assert_eq!(amounts, vec![6.0, 7.0, 8.0, 9.0]);
    assert!(json["data"][0].get("status").is_none());
    assert!(json["data"][0].get("id").is_some());

    let (status, json) = send(
        &app,
        "GET",
        "/api/admin/shipments?colour=red",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_admin_users_and_create() {
    let (app, state) = setup();
    register(&app, "ada@example.com").await;
    let admin = admin_token(&app, &state).await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/admin/create",
        Some(&admin),
        Some(json!({"name": "Second", "email": "second@example.com", "password": "another1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["role"], "admin");
    assert_eq!(json["data"]["email"], "second@example.com");

    let (status, json) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 3);
}
