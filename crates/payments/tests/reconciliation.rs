//! Webhook reconciliation tests over the in-memory store and gateway.

use common::{Money, OrderStatus, PaymentStatus, UserId};
use payments::{
    IntentRequest, InMemoryGateway, PaymentError, PaymentService, RazorpayKeys, signature,
};
use store::{InMemoryStore, NewOrder, NewOrderItem, NewProduct, Store};

const WEBHOOK_SECRET: &str = "webhook_secret";

fn keys() -> RazorpayKeys {
    RazorpayKeys {
        key_id: "rzp_test_key".to_string(),
        key_secret: "key_secret".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
    }
}

struct Harness {
    store: InMemoryStore,
    service: PaymentService<InMemoryStore, InMemoryGateway>,
    buyer: UserId,
    order: common::Order,
}

async fn harness() -> Harness {
    let store = InMemoryStore::new();
    let gateway = InMemoryGateway::new();
    let service = PaymentService::new(store.clone(), gateway, keys());
    let buyer = UserId::new();

    let product = store
        .insert_product(NewProduct {
            name: "Hoodie".to_string(),
            price: Money::from_paise(10000),
            discount_price: None,
            stock: 5,
        })
        .await
        .unwrap();
    let (order, _, _) = store
        .create_individual_order(
            NewOrder {
                order_number: format!("ORD-TEST-{}", uuid::Uuid::new_v4().simple()),
                buyer_id: buyer,
                total_amount: Money::from_paise(10000),
                shipping_address: None,
                notes: None,
            },
            vec![NewOrderItem {
                product_id: product.id,
                quantity: 1,
                unit_price: Money::from_paise(10000),
            }],
        )
        .await
        .unwrap();

    Harness {
        store,
        service,
        buyer,
        order,
    }
}

async fn create_intent(h: &Harness) -> String {
    h.service
        .create_intent(
            h.buyer,
            IntentRequest {
                order_id: h.order.id,
                amount: Money::from_paise(10000),
                currency: "INR".to_string(),
            },
        )
        .await
        .unwrap()
        .gateway_order
        .id
}

fn authorized_body(gateway_ref: &str, payment_ref: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "event": "payment.authorized",
        "payload": {
            "payment": { "entity": { "id": payment_ref, "order_id": gateway_ref } }
        }
    }))
    .unwrap()
}

async fn deliver(h: &Harness, body: &[u8]) -> Result<(), PaymentError> {
    let sig = signature::sign(WEBHOOK_SECRET, body);
    h.service.handle_webhook(body, Some(&sig)).await
}

#[tokio::test]
async fn authorized_webhook_completes_payment_and_order() {
    let h = harness().await;
    let gateway_ref = create_intent(&h).await;

    deliver(&h, &authorized_body(&gateway_ref, "pay_1")).await.unwrap();

    let payment = h
        .store
        .get_payment_by_gateway_ref(&gateway_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.transaction_id.as_deref(), Some("pay_1"));
    assert_eq!(
        h.store.get_order(h.order.id).await.unwrap().unwrap().status,
        OrderStatus::Processing
    );
}

#[tokio::test]
async fn replayed_authorized_webhook_is_idempotent() {
    let h = harness().await;
    let gateway_ref = create_intent(&h).await;

    deliver(&h, &authorized_body(&gateway_ref, "pay_1")).await.unwrap();
    // replay with a different payment reference: skipped, nothing clobbered
    deliver(&h, &authorized_body(&gateway_ref, "pay_2")).await.unwrap();

    let payment = h
        .store
        .get_payment_by_gateway_ref(&gateway_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.transaction_id.as_deref(), Some("pay_1"));
}

#[tokio::test]
async fn unknown_reference_is_a_logged_no_op() {
    let h = harness().await;

    // must not error: the gateway would retry a failure forever
    deliver(&h, &authorized_body("order_unknown", "pay_1")).await.unwrap();
}

#[tokio::test]
async fn unknown_event_type_is_ignored() {
    let h = harness().await;
    let body = serde_json::to_vec(&serde_json::json!({
        "event": "subscription.activated",
        "payload": {}
    }))
    .unwrap();

    deliver(&h, &body).await.unwrap();
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let h = harness().await;
    let body = authorized_body("order_x", "pay_1");

    let err = h.service.handle_webhook(&body, None).await.unwrap_err();
    assert!(matches!(err, PaymentError::MissingSignature));
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let h = harness().await;
    let gateway_ref = create_intent(&h).await;
    let body = authorized_body(&gateway_ref, "pay_1");

    let err = h
        .service
        .handle_webhook(&body, Some("deadbeef"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSignature));

    // a rejected delivery must not move payment state
    let payment = h
        .store
        .get_payment_by_gateway_ref(&gateway_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn tampered_body_fails_signature_check() {
    let h = harness().await;
    let gateway_ref = create_intent(&h).await;
    let body = authorized_body(&gateway_ref, "pay_1");
    let sig = signature::sign(WEBHOOK_SECRET, &body);

    let tampered = authorized_body(&gateway_ref, "pay_evil");
    let err = h
        .service
        .handle_webhook(&tampered, Some(&sig))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSignature));
}

#[tokio::test]
async fn garbage_body_with_valid_signature_is_invalid_payload() {
    let h = harness().await;
    let body = b"definitely not json";
    let sig = signature::sign(WEBHOOK_SECRET, body);

    let err = h.service.handle_webhook(body, Some(&sig)).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidPayload(_)));
}

#[tokio::test]
async fn failed_webhook_marks_payment_failed_only() {
    let h = harness().await;
    let gateway_ref = create_intent(&h).await;
    let body = serde_json::to_vec(&serde_json::json!({
        "event": "payment.failed",
        "payload": {
            "payment": { "entity": { "id": "pay_1", "order_id": gateway_ref } }
        }
    }))
    .unwrap();

    deliver(&h, &body).await.unwrap();

    let payment = h
        .store
        .get_payment_by_gateway_ref(&gateway_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    // the order stays pending so the buyer can retry
    assert_eq!(
        h.store.get_order(h.order.id).await.unwrap().unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn refund_webhook_looks_up_by_transaction_id() {
    let h = harness().await;
    let gateway_ref = create_intent(&h).await;
    deliver(&h, &authorized_body(&gateway_ref, "pay_1")).await.unwrap();

    let body = serde_json::to_vec(&serde_json::json!({
        "event": "refund.created",
        "payload": {
            "refund": { "entity": { "id": "rfnd_1", "payment_id": "pay_1" } }
        }
    }))
    .unwrap();
    deliver(&h, &body).await.unwrap();

    let payment = h
        .store
        .get_payment_by_transaction("pay_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);

    // refund for an unknown payment reference is a no-op
    let body = serde_json::to_vec(&serde_json::json!({
        "event": "refund.created",
        "payload": {
            "refund": { "entity": { "id": "rfnd_2", "payment_id": "pay_unknown" } }
        }
    }))
    .unwrap();
    deliver(&h, &body).await.unwrap();
}
