//! Payment record and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{OrderId, PaymentId, UserId};

/// The state of a payment record.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed ──► Refunded
///           │
///           └──► Failed
/// ```
///
/// A payment transitions out of Pending exactly once, driven by either
/// the synchronous verify call or an asynchronous webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Intent created, awaiting gateway confirmation.
    #[default]
    Pending,

    /// Signature verified or gateway authorized the charge.
    Completed,

    /// Signature mismatch or gateway reported failure (terminal state).
    Failed,

    /// Completed payment later refunded by the gateway (terminal state).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if the payment can complete from this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if the payment can fail from this state.
    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if the payment can be refunded from this state.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Returns true if no further webhook-driven transition applies.
    ///
    /// Replayed gateway events against a terminal payment are skipped
    /// rather than re-applied.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns the status as its stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment intent and its reconciliation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub amount: Money,
    /// Payment method label, e.g. `"razorpay"`.
    pub method: String,
    /// Remote order reference issued by the gateway at intent creation.
    pub gateway_ref: String,
    pub status: PaymentStatus,
    /// Gateway payment reference, recorded when the payment settles.
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
