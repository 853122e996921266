//! HTTP API server for the merch order system.
//!
//! REST endpoints for individual orders, group orders, and payment
//! reconciliation, with structured logging (tracing) and Prometheus
//! metrics. Authentication is handled upstream; see [`auth::Principal`].

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{GroupOrderService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{PaymentService, RazorpayGateway, RazorpayKeys};
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders/individual", post(routes::orders::create::<S, G>))
        .route("/orders/user", get(routes::orders::list_for_user::<S, G>))
        .route("/orders/group", post(routes::groups::create::<S, G>))
        .route("/orders/group/{id}/join", post(routes::groups::join::<S, G>))
        .route(
            "/orders/group/{id}/invite",
            post(routes::groups::invite::<S, G>),
        )
        .route(
            "/orders/group/{id}/finalize",
            post(routes::groups::finalize::<S, G>),
        )
        .route(
            "/orders/group/{id}/cancel",
            post(routes::groups::cancel::<S, G>),
        )
        .route(
            "/payments/razorpay/create",
            post(routes::payments::create_intent::<S, G>),
        )
        .route(
            "/payments/razorpay/verify",
            post(routes::payments::verify::<S, G>),
        )
        .route(
            "/payments/razorpay/webhook",
            post(routes::payments::webhook::<S, G>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state from a store, gateway, and credentials.
pub fn create_state<S, G>(store: S, gateway: G, keys: RazorpayKeys) -> Arc<AppState<S, G>>
where
    S: Store + Clone,
    G: RazorpayGateway,
{
    Arc::new(AppState {
        orders: OrderService::new(store.clone()),
        groups: GroupOrderService::new(store.clone()),
        payments: PaymentService::new(store.clone(), gateway, keys),
        store,
    })
}
