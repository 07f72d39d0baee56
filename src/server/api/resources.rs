use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::{
    CreateResourceRequest, HolderPermissionsRequest, PermissionCheckResponse,
    UpdateResourceRequest, resource_filter,
};
use crate::server::response::{ApiError, ApiResponse};

pub async fn create_resource(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateResourceRequest>,
) -> impl IntoResponse {
    let resource = state
        .engine
        .create_resource(&identity, req.application_id, req.resource_data)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(resource))))
}

pub async fn list_resources(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let filter = resource_filter(params).map_err(ApiError::bad_request)?;
    let resources = state.engine.list_resources(&identity, &filter)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(resources)))
}

pub async fn get_resource(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let resource = state.engine.get_resource(&identity, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(resource)))
}

pub async fn update_resource(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResourceRequest>,
) -> impl IntoResponse {
    let resource = state
        .engine
        .update_resource_data(&identity, id, req.update, &req.drop_keys)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(resource)))
}

pub async fn delete_resource(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    state.engine.delete_resource(&identity, id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_permissions(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let permissions = state.engine.resolve_permissions(&identity, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(permissions)))
}

pub async fn check_permission(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let allowed = state.engine.has_permission(&identity, id, &name)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(PermissionCheckResponse {
        resource_id: id,
        permission: name,
        allowed,
    })))
}

pub async fn list_holders(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let holders = state.engine.resource_holders(&identity, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(holders)))
}

pub async fn grant_permissions(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<HolderPermissionsRequest>,
) -> impl IntoResponse {
    let reports = state
        .engine
        .grant_permission(&identity, id, req.holder, &req.permissions)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(reports)))
}

pub async fn revoke_permissions(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<HolderPermissionsRequest>,
) -> impl IntoResponse {
    let reports = state
        .engine
        .revoke_permission(&identity, id, req.holder, &req.permissions)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(reports)))
}
