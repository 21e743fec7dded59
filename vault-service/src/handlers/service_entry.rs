use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    dtos::{
        item::{CreateServiceRequest, GrantRequest, ServiceListResponse, UpdateServiceRequest},
        MessageResponse,
    },
    middleware::CurrentUser,
    models::{ServiceEntry, ServiceEntryResponse},
    services::ServiceError,
    store::ResourceKind,
    utils::ValidatedJson,
    AppState,
};
use service_core::error::AppError;

/// Service entries of an item, filtered to the ones the caller may read.
pub async fn list_item_services(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    ensure_item_access(&state, &user, item_id).await?;

    let services = state
        .store
        .list_services_for_item(item_id, user.user_id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ServiceListResponse {
        services: services.into_iter().map(ServiceEntryResponse::from).collect(),
    }))
}

pub async fn create_item_service(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_item_access(&state, &user, item_id).await?;

    let service = ServiceEntry::new(item_id, req.name, req.host, req.port, req.login, req.secret);

    state
        .store
        .create_service(&service, user.user_id)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(service_id = %service.service_id, item_id = %item_id, "Service entry created");

    Ok((StatusCode::CREATED, Json(ServiceEntryResponse::from(service))))
}

pub async fn get_service(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let service = load_service(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Service, id).await?;

    Ok(Json(ServiceEntryResponse::from(service)))
}

pub async fn update_service(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut service = load_service(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Service, id).await?;

    if let Some(name) = req.name {
        service.name = name;
    }
    if let Some(host) = req.host {
        service.host = host;
    }
    if req.port.is_some() {
        service.port = req.port;
    }
    if let Some(login) = req.login {
        service.login = login;
    }
    if let Some(secret) = req.secret {
        service.secret = secret;
    }

    state
        .store
        .update_service(&service)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(MessageResponse::new("Service updated")))
}

pub async fn delete_service(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_service(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Service, id).await?;

    state
        .store
        .delete_service(id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(MessageResponse::new("Deletion successful")))
}

pub async fn grant_service_principal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<GrantRequest>,
) -> Result<impl IntoResponse, AppError> {
    load_service(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Service, id).await?;

    let grantee = state
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("User"))?;

    state
        .acl
        .grant(ResourceKind::Service, id, grantee.user_id)
        .await?;

    Ok(Json(MessageResponse::new("Access granted")))
}

pub async fn revoke_service_principal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, principal_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    load_service(&state, id).await?;
    state.acl.authorize(&user, ResourceKind::Service, id).await?;

    state
        .acl
        .revoke(ResourceKind::Service, id, principal_id)
        .await?;

    Ok(Json(MessageResponse::new("Access revoked")))
}

/// Nested routes check the parent item's relation before touching entries.
async fn ensure_item_access(
    state: &AppState,
    user: &crate::models::User,
    item_id: Uuid,
) -> Result<(), AppError> {
    state
        .store
        .get_item(item_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("Item"))?;
    state
        .acl
        .authorize(user, ResourceKind::Item, item_id)
        .await?;
    Ok(())
}

async fn load_service(state: &AppState, id: Uuid) -> Result<ServiceEntry, AppError> {
    Ok(state
        .store
        .get_service(id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("Service"))?)
}
