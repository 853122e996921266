//! Resolved request principal.
//!
//! Authentication itself lives in the upstream gateway; by the time a
//! request reaches this service the caller has been resolved and the
//! gateway has installed `x-user-id` and `x-user-role` headers. This
//! extractor consumes that contract.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use uuid::Uuid;

use crate::error::ApiError;

/// Role of the resolved caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// The authenticated caller, as resolved by the upstream auth layer.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(ApiError::Unauthorized)?;
        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .map(Role::parse)
            .unwrap_or_default();

        Ok(Principal {
            user_id: UserId::from_uuid(user_id),
            role,
        })
    }
}
