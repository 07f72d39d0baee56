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
    ApplicationListQuery, CreateApplicationRequest, CreateGroupRequest, RenameGroupRequest,
    ReparentGroupRequest, SetMembershipRequest,
};
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_memberships(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let memberships = state.engine.memberships(&identity)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(memberships)))
}

pub async fn create_group(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    let group = state.engine.create_group(&identity, &req.name, req.parent)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

pub async fn get_group(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let details = state.engine.group_details(&identity, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(details)))
}

pub async fn rename_group(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameGroupRequest>,
) -> impl IntoResponse {
    let group = state.engine.rename_group(&identity, id, &req.name)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

pub async fn reparent_group(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReparentGroupRequest>,
) -> impl IntoResponse {
    let group = state.engine.reparent_group(&identity, id, req.parent)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

pub async fn delete_group(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    state.engine.delete_group(&identity, id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let members = state.engine.group_members(&identity, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(members)))
}

pub async fn set_membership(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetMembershipRequest>,
) -> impl IntoResponse {
    let membership = state
        .engine
        .set_membership(&identity, id, user_id, req.role)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(membership)))
}

pub async fn remove_member(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    state.engine.remove_member(&identity, id, user_id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn create_application(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateApplicationRequest>,
) -> impl IntoResponse {
    let app = state.engine.create_application(
        &identity,
        id,
        &req.name,
        req.description.as_deref(),
    )?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(app))))
}

pub async fn list_applications(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ApplicationListQuery>,
) -> impl IntoResponse {
    let apps = state.engine.list_applications(&identity, query.group_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(apps)))
}

pub async fn get_application(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let app = state.engine.get_application(&identity, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(app)))
}

pub async fn delete_application(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    state.engine.delete_application(&identity, id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
