use axum::{extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

use crate::{
    dtos::{
        group::{AddMemberRequest, CreateGroupRequest, GroupListResponse},
        MessageResponse,
    },
    middleware::CurrentUser,
    models::{Group, GroupResponse},
    services::ServiceError,
    store::StoreError,
    utils::ValidatedJson,
    AppState,
};
use service_core::error::AppError;

pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = Group::new(req.name);

    match state.store.create_group(&group, user.user_id).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(AppError::Conflict(anyhow::anyhow!("Group name already taken")));
        }
        Err(e) => return Err(ServiceError::from(e).into()),
    }

    tracing::info!(group_id = %group.group_id, user_id = %user.user_id, "Group created");

    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

pub async fn add_group_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Only members may extend a group
    if !state
        .store
        .is_group_member(group_id, user.user_id)
        .await
        .map_err(ServiceError::from)?
    {
        return Err(ServiceError::Forbidden.into());
    }

    let member = state
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("User"))?;

    state
        .store
        .add_group_member(group_id, member.user_id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(MessageResponse::new("Member added")))
}

pub async fn list_my_groups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let groups = state
        .store
        .list_groups_for_user(user.user_id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(GroupListResponse {
        groups: groups.into_iter().map(GroupResponse::from).collect(),
    }))
}
