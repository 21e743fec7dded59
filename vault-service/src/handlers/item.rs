use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    dtos::{
        item::{
            CreateItemRequest, GrantRequest, ItemListResponse, ListItemsQuery, UpdateItemRequest,
        },
        MessageResponse,
    },
    middleware::CurrentUser,
    models::{Item, ItemResponse},
    services::ServiceError,
    store::ResourceKind,
    utils::ValidatedJson,
    AppState,
};
use service_core::error::AppError;

/// List the items the caller has access to
#[utoipa::path(
    get,
    path = "/items",
    params(ListItemsQuery),
    responses(
        (status = 200, description = "Accessible items", body = ItemListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn list_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListItemsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let items = state
        .store
        .list_items_for_user(user.user_id, query.category.as_deref())
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ItemListResponse {
        items: items.into_iter().map(ItemResponse::from).collect(),
    }))
}

/// Create an item; the creator is granted access in the same transaction
#[utoipa::path(
    post,
    path = "/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn create_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let item = Item::new(req.name, req.description, req.category, req.tags);

    state
        .store
        .create_item(&item, user.user_id)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(item_id = %item.item_id, user_id = %user.user_id, "Item created");

    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// Fetch one item
#[utoipa::path(
    get,
    path = "/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item detail", body = ItemResponse),
        (status = 403, description = "Not an allowed principal", body = ErrorResponse),
        (status = 404, description = "No such item", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn get_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = load_item(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Item, id).await?;

    Ok(Json(ItemResponse::from(item)))
}

/// Update an item
#[utoipa::path(
    put,
    path = "/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = MessageResponse),
        (status = 403, description = "Not an allowed principal", body = ErrorResponse),
        (status = 404, description = "No such item", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut item = load_item(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Item, id).await?;

    if let Some(name) = req.name {
        item.name = name;
    }
    if let Some(description) = req.description {
        item.description = description;
    }
    if req.category.is_some() {
        item.category = req.category;
    }
    if req.tags.is_some() {
        item.tags = req.tags;
    }

    state
        .store
        .update_item(&item)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(MessageResponse::new("Item updated")))
}

/// Delete an item and everything nested under it
#[utoipa::path(
    delete,
    path = "/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 403, description = "Not an allowed principal", body = ErrorResponse),
        (status = 404, description = "No such item", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_item(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Item, id).await?;

    state
        .store
        .delete_item(id)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(item_id = %id, user_id = %user.user_id, "Item deleted");

    Ok(Json(MessageResponse::new("Deletion successful")))
}

/// Grant another user access to an item
#[utoipa::path(
    post,
    path = "/items/{id}/principals",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = GrantRequest,
    responses(
        (status = 200, description = "Access granted", body = MessageResponse),
        (status = 403, description = "Not an allowed principal", body = ErrorResponse),
        (status = 404, description = "No such item or user", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn grant_item_principal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<GrantRequest>,
) -> Result<impl IntoResponse, AppError> {
    load_item(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Item, id).await?;

    let grantee = state
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("User"))?;

    state
        .acl
        .grant(ResourceKind::Item, id, grantee.user_id)
        .await?;

    tracing::info!(item_id = %id, grantee = %grantee.user_id, granted_by = %user.user_id, "Item access granted");

    Ok(Json(MessageResponse::new("Access granted")))
}

/// Revoke a user's access to an item; the last principal cannot be removed
#[utoipa::path(
    delete,
    path = "/items/{id}/principals/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Item id"),
        ("user_id" = Uuid, Path, description = "Principal to revoke")
    ),
    responses(
        (status = 200, description = "Access revoked", body = MessageResponse),
        (status = 403, description = "Not an allowed principal", body = ErrorResponse),
        (status = 404, description = "No such item or grant", body = ErrorResponse),
        (status = 409, description = "Would orphan the item", body = ErrorResponse)
    ),
    tag = "Items",
    security(("bearer_auth" = []))
)]
pub async fn revoke_item_principal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, principal_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    load_item(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Item, id).await?;

    state.acl.revoke(ResourceKind::Item, id, principal_id).await?;

    tracing::info!(item_id = %id, principal = %principal_id, revoked_by = %user.user_id, "Item access revoked");

    Ok(Json(MessageResponse::new("Access revoked")))
}

async fn load_item(state: &AppState, id: Uuid) -> Result<Item, AppError> {
    Ok(state
        .store
        .get_item(id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("Item"))?)
}
