//! Group order entities and their state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GroupOrderId, OrderId, UserId};

/// The state of a group order's membership window.
///
/// State transitions:
/// ```text
/// Open ──┬──► Closed     (finalize, creator only)
///        │
///        └──► Cancelled  (cancel, creator only)
/// ```
///
/// Closed and Cancelled are terminal; nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GroupOrderStatus {
    /// Accepting joins and invitations.
    #[default]
    Open,

    /// Finalized; membership closed, inventory committed (terminal state).
    Closed,

    /// Cancelled by the creator (terminal state).
    Cancelled,
}

impl GroupOrderStatus {
    /// Returns true if new members can join or be invited.
    pub fn accepts_members(&self) -> bool {
        matches!(self, GroupOrderStatus::Open)
    }

    /// Returns true if the group order can be finalized.
    pub fn can_finalize(&self) -> bool {
        matches!(self, GroupOrderStatus::Open)
    }

    /// Returns true if the group order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, GroupOrderStatus::Open)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GroupOrderStatus::Closed | GroupOrderStatus::Cancelled)
    }

    /// Returns the status as its stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupOrderStatus::Open => "OPEN",
            GroupOrderStatus::Closed => "CLOSED",
            GroupOrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(GroupOrderStatus::Open),
            "CLOSED" => Some(GroupOrderStatus::Closed),
            "CANCELLED" => Some(GroupOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for GroupOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership status of a participant in a group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Joined directly, or accepted an invitation.
    Confirmed,

    /// Invited by the creator, not yet confirmed.
    Invited,
}

impl MemberStatus {
    /// Returns the status as its stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Confirmed => "CONFIRMED",
            MemberStatus::Invited => "INVITED",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONFIRMED" => Some(MemberStatus::Confirmed),
            "INVITED" => Some(MemberStatus::Invited),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A shared order opened by one creator that others join before a single
/// finalize event commits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOrder {
    pub id: GroupOrderId,
    pub order_id: OrderId,
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    /// Advisory membership deadline; not enforced by any scheduled process.
    pub deadline: DateTime<Utc>,
    pub status: GroupOrderStatus,
}

/// One user's membership in a group order.
///
/// At most one row exists per (group_order_id, user_id) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOrderMember {
    pub id: uuid::Uuid,
    pub group_order_id: GroupOrderId,
    pub user_id: UserId,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}
