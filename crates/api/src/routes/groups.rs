//! Group order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{GroupOrder, GroupOrderId, GroupOrderMember};
use domain::GroupDraft;
use payments::RazorpayGateway;
use serde::{Deserialize, Serialize};
use store::Store;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::routes::orders::{AppState, OrderItemRequest, OrderResponse, parse_lines};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateGroupOrderRequest {
    pub name: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct GroupOrderResponse {
    pub id: String,
    pub order_id: String,
    pub creator_id: String,
    pub name: String,
    pub description: Option<String>,
    pub deadline: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct MemberResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub joined_at: String,
}

#[derive(Serialize)]
pub struct CreatedGroupOrderResponse {
    pub order: OrderResponse,
    pub group: GroupOrderResponse,
}

impl GroupOrderResponse {
    pub(crate) fn from_group(group: &GroupOrder) -> Self {
        Self {
            id: group.id.to_string(),
            order_id: group.order_id.to_string(),
            creator_id: group.creator_id.to_string(),
            name: group.name.clone(),
            description: group.description.clone(),
            deadline: group.deadline.to_rfc3339(),
            status: group.status.to_string(),
        }
    }
}

impl MemberResponse {
    fn from_member(member: &GroupOrderMember) -> Self {
        Self {
            id: member.id.to_string(),
            user_id: member.user_id.to_string(),
            status: member.status.to_string(),
            joined_at: member.joined_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders/group — open a new group order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Json(req): Json<CreateGroupOrderRequest>,
) -> Result<(StatusCode, Json<CreatedGroupOrderResponse>), ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let draft = GroupDraft {
        name: req.name,
        description: req.description,
        deadline: req.deadline,
        items: parse_lines(&req.items),
    };
    let (order, group) = state.groups.create(principal.user_id, draft).await?;

    let response = CreatedGroupOrderResponse {
        order: OrderResponse::from_order(&order),
        group: GroupOrderResponse::from_group(&group),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /orders/group/{id}/join — join an open group order.
#[tracing::instrument(skip(state))]
pub async fn join<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<MemberResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let member = state
        .groups
        .join(GroupOrderId::from_uuid(id), principal.user_id)
        .await?;
    Ok(Json(MemberResponse::from_member(&member)))
}

/// POST /orders/group/{id}/invite — invite a user by email. Creator only.
#[tracing::instrument(skip(state, req))]
pub async fn invite<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let member = state
        .groups
        .invite(GroupOrderId::from_uuid(id), principal.user_id, &req.email)
        .await?;
    Ok((StatusCode::CREATED, Json(MemberResponse::from_member(&member))))
}

/// POST /orders/group/{id}/finalize — close membership and commit
/// inventory. Creator only.
#[tracing::instrument(skip(state))]
pub async fn finalize<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<GroupOrderResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let group = state
        .groups
        .finalize(GroupOrderId::from_uuid(id), principal.user_id)
        .await?;
    Ok(Json(GroupOrderResponse::from_group(&group)))
}

/// POST /orders/group/{id}/cancel — cancel an open group order. Creator
/// only.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<GroupOrderResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: RazorpayGateway + 'static,
{
    let group = state
        .groups
        .cancel(GroupOrderId::from_uuid(id), principal.user_id)
        .await?;
    Ok(Json(GroupOrderResponse::from_group(&group)))
}
