//! Individual order endpoints and shared application state.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{Order, OrderItem, ProductId};
use domain::{GroupOrderService, OrderDraft, OrderLine, OrderService};
use payments::{PaymentService, RazorpayGateway};
use serde::{Deserialize, Serialize};
use store::{OrderDetails, Store};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::routes::groups::GroupOrderResponse;
use crate::routes::payments::PaymentResponse;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store, G: RazorpayGateway> {
    pub orders: OrderService<S>,
    pub groups: GroupOrderService<S>,
    pub payments: PaymentService<S, G>,
    pub store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub buyer_id: String,
    pub status: String,
    pub total_paise: i64,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_paise: i64,
}

#[derive(Serialize)]
pub struct CreatedOrderResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderDetailsResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    pub payments: Vec<PaymentResponse>,
    pub group: Option<GroupOrderResponse>,
}

impl OrderResponse {
    pub(crate) fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.clone(),
            buyer_id: order.buyer_id.to_string(),
            status: order.status.to_string(),
            total_paise: order.total_amount.paise(),
            shipping_address: order.shipping_address.clone(),
            notes: order.notes.clone(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

impl OrderItemResponse {
    pub(crate) fn from_item(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price_paise: item.unit_price.paise(),
        }
    }
}

impl OrderDetailsResponse {
    fn from_details(details: &OrderDetails) -> Self {
        Self {
            order: OrderResponse::from_order(&details.order),
            items: details.items.iter().map(OrderItemResponse::from_item).collect(),
            payments: details
                .payments
                .iter()
                .map(PaymentResponse::from_payment)
                .collect(),
            group: details.group.as_ref().map(GroupOrderResponse::from_group),
        }
    }
}

pub(crate) fn parse_lines(items: &[OrderItemRequest]) -> Vec<OrderLine> {
    items
        .iter()
        .map(|item| OrderLine {
            product_id: ProductId::from_uuid(item.product_id),
            quantity: item.quantity,
        })
        .collect()
}

// -- Handlers --

/// POST /orders/individual — create an individual order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreatedOrderResponse>), ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let draft = OrderDraft {
        items: parse_lines(&req.items),
        shipping_address: req.shipping_address,
        notes: req.notes,
    };
    let (order, items, _link) = state.orders.create_order(principal.user_id, draft).await?;

    let response = CreatedOrderResponse {
        order: OrderResponse::from_order(&order),
        items: items.iter().map(OrderItemResponse::from_item).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/user — list the caller's orders (individual and group).
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
) -> Result<Json<Vec<OrderDetailsResponse>>, ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let details = state.orders.orders_for_user(principal.user_id).await?;
    let responses = details.iter().map(OrderDetailsResponse::from_details).collect();
    Ok(Json(responses))
}
