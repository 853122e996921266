//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{InMemoryGateway, RazorpayKeys, signature};
use store::{InMemoryStore, NewProduct, Store};
use tower::ServiceExt;

use api::routes::orders::AppState;

const KEY_SECRET: &str = "test-key-secret";
const WEBHOOK_SECRET: &str = "test-webhook-secret";

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

fn keys() -> RazorpayKeys {
    RazorpayKeys {
        key_id: "rzp_test_key".to_string(),
        key_secret: KEY_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
    }
}

fn setup() -> (
    axum::Router,
    Arc<AppState<InMemoryStore, InMemoryGateway>>,
) {
    let store = InMemoryStore::new();
    let state = api::create_state(store, InMemoryGateway::new(), keys());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn seed_product(state: &AppState<InMemoryStore, InMemoryGateway>, stock: u32) -> String {
    state
        .store
        .insert_product(NewProduct {
            name: "Hoodie".to_string(),
            price: Money::from_paise(10000),
            discount_price: None,
            stock,
        })
        .await
        .unwrap()
        .id
        .to_string()
}

fn post_json(uri: &str, user: Option<UserId>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_unauthenticated_request_is_rejected() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/orders/individual",
            None,
            serde_json::json!({ "items": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_individual_order() {
    let (app, state) = setup();
    let product_id = seed_product(&state, 5).await;
    let buyer = UserId::new();

    let response = app
        .clone()
        .oneshot(post_json(
            "/orders/individual",
            Some(buyer),
            serde_json::json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "shipping_address": "Hostel B, Room 12"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["order"]["status"], "PENDING");
    assert_eq!(json["order"]["total_paise"], 20000);
    assert_eq!(json["items"][0]["unit_price_paise"], 10000);

    // the order shows up in the buyer's listing
    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders/user")
                .header("x-user-id", buyer.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_order_insufficient_stock_is_bad_request() {
    let (app, state) = setup();
    let product_id = seed_product(&state, 1).await;

    let response = app
        .oneshot(post_json(
            "/orders/individual",
            Some(UserId::new()),
            serde_json::json!({
                "items": [{ "product_id": product_id, "quantity": 5 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_unknown_product_is_not_found() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/orders/individual",
            Some(UserId::new()),
            serde_json::json!({
                "items": [{ "product_id": uuid::Uuid::new_v4().to_string(), "quantity": 1 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_order_lifecycle_over_http() {
    let (app, state) = setup();
    let product_id = seed_product(&state, 10).await;
    let creator = UserId::new();
    let deadline = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();

    let response = app
        .clone()
        .oneshot(post_json(
            "/orders/group",
            Some(creator),
            serde_json::json!({
                "name": "Club jerseys",
                "deadline": deadline,
                "items": [{ "product_id": product_id, "quantity": 4 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["group"]["status"], "OPEN");
    let group_id = json["group"]["id"].as_str().unwrap().to_string();

    // another user joins
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/group/{group_id}/join"),
            Some(UserId::new()),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // a non-creator cannot finalize
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/group/{group_id}/finalize"),
            Some(UserId::new()),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // the creator can
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/group/{group_id}/finalize"),
            Some(creator),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "CLOSED");

    // joining after finalize is rejected
    let response = app
        .oneshot(post_json(
            &format!("/orders/group/{group_id}/join"),
            Some(UserId::new()),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_intent_verify_flow() {
    let (app, state) = setup();
    let product_id = seed_product(&state, 5).await;
    let buyer = UserId::new();

    let response = app
        .clone()
        .oneshot(post_json(
            "/orders/individual",
            Some(buyer),
            serde_json::json!({
                "items": [{ "product_id": product_id, "quantity": 1 }]
            }),
        ))
        .await
        .unwrap();
    let order_id = json_body(response).await["order"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            "/payments/razorpay/create",
            Some(buyer),
            serde_json::json!({
                "order_id": order_id,
                "amount_paise": 10000
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["payment"]["status"], "PENDING");
    assert_eq!(json["key_id"], "rzp_test_key");
    let gateway_order_id = json["gateway_order_id"].as_str().unwrap().to_string();

    // tampered signature fails with 400 and marks the payment failed
    let response = app
        .clone()
        .oneshot(post_json(
            "/payments/razorpay/verify",
            Some(buyer),
            serde_json::json!({
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": "pay_1",
                "signature": "deadbeef"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // a fresh intent with a correct signature settles
    let response = app
        .clone()
        .oneshot(post_json(
            "/payments/razorpay/create",
            Some(buyer),
            serde_json::json!({
                "order_id": order_id,
                "amount_paise": 10000
            }),
        ))
        .await
        .unwrap();
    let gateway_order_id = json_body(response).await["gateway_order_id"]
        .as_str()
        .unwrap()
        .to_string();
    let sig = signature::sign(
        KEY_SECRET,
        format!("{gateway_order_id}|pay_2").as_bytes(),
    );
    let response = app
        .oneshot(post_json(
            "/payments/razorpay/verify",
            Some(buyer),
            serde_json::json!({
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": "pay_2",
                "signature": sig
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "COMPLETED");
    assert_eq!(json["transaction_id"], "pay_2");
}

#[tokio::test]
async fn test_webhook_signature_handling() {
    let (app, _) = setup();
    let body = serde_json::json!({
        "event": "payment.authorized",
        "payload": {
            "payment": { "entity": { "id": "pay_1", "order_id": "order_unknown" } }
        }
    })
    .to_string();

    // no signature header
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/razorpay/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // valid signature, unknown reference: acknowledged with 200
    let sig = signature::sign(WEBHOOK_SECRET, body.as_bytes());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/razorpay/webhook")
                .header("content-type", "application/json")
                .header("x-razorpay-signature", sig)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
