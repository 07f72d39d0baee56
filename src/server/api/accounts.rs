use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::accounts::{NewUser, TokenUpdate};
use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::{ChangePasswordRequest, LoginRequest};
use crate::server::response::{ApiError, ApiResponse};

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewUser>,
) -> impl IntoResponse {
    let user = state.engine.create_user(req)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn current_user(RequireIdentity(identity): RequireIdentity) -> impl IntoResponse {
    Json(ApiResponse::success(identity.user))
}

pub async fn change_password(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let user = state
        .engine
        .change_password(&identity, &req.current_password, &req.new_password)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let token = state
        .engine
        .login(&req.username, &req.password, req.application_id, req.options)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(token))))
}

pub async fn list_tokens(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let tokens = state.engine.list_tokens(&identity)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(tokens)))
}

pub async fn revoke_current_token(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let token = state.engine.revoke_token(&identity, None)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(token)))
}

pub async fn revoke_token(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let token = state.engine.revoke_token(&identity, Some(id))?;
    Ok::<_, ApiError>(Json(ApiResponse::success(token)))
}

pub async fn update_current_token(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(update): Json<TokenUpdate>,
) -> impl IntoResponse {
    let token = state.engine.update_token(&identity, None, update)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(token)))
}

pub async fn update_token(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<TokenUpdate>,
) -> impl IntoResponse {
    let token = state.engine.update_token(&identity, Some(id), update)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(token)))
}
