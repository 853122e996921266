//! Payment gateway client trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;
use thiserror::Error;

/// Errors returned by the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway rejected the request.
    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    /// The gateway could not be reached.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// A remote order object created on the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    /// Opaque gateway order reference (e.g. `order_...`).
    pub id: String,
    pub amount: Money,
    pub currency: String,
}

/// Trait for the external payment processor.
#[async_trait]
pub trait RazorpayGateway: Send + Sync {
    /// Creates a remote order to collect `amount` against, tagged with
    /// the local receipt (order number) for reconciliation on the
    /// gateway's side.
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    orders: Vec<(GatewayOrder, String)>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail on the next create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Returns the number of remote orders created.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns the receipt the given gateway order was created with.
    pub fn receipt_for(&self, gateway_order_id: &str) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .orders
            .iter()
            .find(|(order, _)| order.id == gateway_order_id)
            .map(|(_, receipt)| receipt.clone())
    }
}

#[async_trait]
impl RazorpayGateway for InMemoryGateway {
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        state.next_id += 1;
        let order = GatewayOrder {
            id: format!("order_{:06}", state.next_id),
            amount,
            currency: currency.to_string(),
        };
        state.orders.push((order.clone(), receipt.to_string()));

        Ok(order)
    }
}
