//! Group membership endpoints under `/api/groups/{group}/users`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UserId;
use domain::DomainError;
use serde::Deserialize;
use store::{Group, Store};

use crate::auth::CurrentUser;
use crate::error::{ApiError, parse_id};
use crate::routes::{AppState, UserResponse};

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub username: String,
}

/// Maps the path segment to a group. Unknown groups are a 404.
fn group_from_path(segment: &str) -> Result<Group, ApiError> {
    match segment {
        "manager" => Ok(Group::Manager),
        "delivery-crew" => Ok(Group::DeliveryCrew),
        other => Err(DomainError::NotFound(format!("group {other} not found")).into()),
    }
}

/// GET /api/groups/{group}/users
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(group): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let group = group_from_path(&group)?;
    let members = state.groups.list_members(&user, group).await?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

/// POST /api/groups/{group}/users
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(group): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let group = group_from_path(&group)?;
    let member = state.groups.add_member(&user, group, &req.username).await?;
    Ok((StatusCode::CREATED, Json(member.into())))
}

/// DELETE /api/groups/{group}/users/{id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path((group, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let group = group_from_path(&group)?;
    let member_id: UserId = parse_id("user id", &id)?;
    state.groups.remove_member(&user, group, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
