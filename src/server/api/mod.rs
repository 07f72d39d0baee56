mod accounts;
mod groups;
mod resources;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Accounts and tokens
        .route("/users", post(accounts::create_user))
        .route("/user", get(accounts::current_user))
        .route("/user/password", put(accounts::change_password))
        .route("/token", post(accounts::login))
        .route("/tokens", get(accounts::list_tokens))
        .route("/tokens/current", patch(accounts::update_current_token))
        .route("/tokens/current", delete(accounts::revoke_current_token))
        .route("/tokens/{id}", patch(accounts::update_token))
        .route("/tokens/{id}", delete(accounts::revoke_token))
        // Groups
        .route("/groups", get(groups::list_memberships))
        .route("/groups", post(groups::create_group))
        .route("/groups/{id}", get(groups::get_group))
        .route("/groups/{id}", patch(groups::reparent_group))
        .route("/groups/{id}/name", put(groups::rename_group))
        .route("/groups/{id}", delete(groups::delete_group))
        .route("/groups/{id}/users", get(groups::list_members))
        .route("/groups/{id}/users/{user_id}", put(groups::set_membership))
        .route("/groups/{id}/users/{user_id}", delete(groups::remove_member))
        .route(
            "/groups/{id}/applications",
            post(groups::create_application),
        )
        .route("/applications", get(groups::list_applications))
        .route("/applications/{id}", get(groups::get_application))
        .route("/applications/{id}", delete(groups::delete_application))
        // Resources
        .route("/resources", get(resources::list_resources))
        .route("/resources", post(resources::create_resource))
        .route("/resources/{id}", get(resources::get_resource))
        .route("/resources/{id}", put(resources::update_resource))
        .route("/resources/{id}", delete(resources::delete_resource))
        .route(
            "/resources/{id}/permissions",
            get(resources::list_permissions),
        )
        .route(
            "/resources/{id}/permissions/{name}",
            get(resources::check_permission),
        )
        .route("/resources/{id}/holders", get(resources::list_holders))
        .route("/resources/{id}/holders", post(resources::grant_permissions))
        .route("/resources/{id}/holders", delete(resources::revoke_permissions))
}
