//! Precondition checks and state changes for every mutation.
//!
//! Each function here runs inside one write transaction opened by the
//! engine, so a check and the change it guards observe the same state.

mod grants;
mod groups;
mod resources;

pub use grants::{
    GrantOutcome, GrantReport, RevokeOutcome, RevokeReport, grant_permissions, resource_holders,
    revoke_permissions,
};
pub use groups::{
    GroupDetails, create_group, delete_group, group_details, remove_member, rename_group,
    reparent_group, set_membership,
};
pub use resources::{
    create_application, create_resource, delete_application, delete_resource, get_application,
    list_applications, update_resource_data,
};

use uuid::Uuid;

use crate::access;
use crate::config::EngineConfig;
use crate::error::{Error, MutationError};
use crate::store::Snapshot;
use crate::types::{Identity, Resource, Role, User};

pub(crate) fn ensure_unrestricted(actor: &Identity) -> Result<(), MutationError> {
    if actor.is_restricted() {
        return Err(MutationError::RestrictedToken);
    }
    Ok(())
}

/// Loads the resource and fails unless the actor holds `permission` on it.
pub(crate) fn require_permission(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    resource_id: Uuid,
    permission: &str,
) -> Result<Resource, MutationError> {
    let resolution = access::resolve(store, actor, resource_id, &config.read_only_permissions)?;
    if !resolution.effective.has(permission) {
        tracing::info!(
            user_id = %actor.user_id(),
            resource_id = %resource_id,
            permission,
            "Denied: missing permission"
        );
        return Err(MutationError::InsufficientPermission);
    }
    Ok(resolution.resource)
}

/// The actor's role in a group. Non-members are refused.
pub(crate) fn require_role(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Uuid,
) -> Result<Role, MutationError> {
    access::member_role(store, group_id, actor.user_id())?.ok_or(MutationError::InsufficientRole)
}

/// Owners may change anyone. Admins may change members and admins but
/// cannot touch owners or hand out ownership. Members change nothing.
pub(crate) fn check_authority(
    actor_role: Role,
    target_current: Option<Role>,
    target_new: Option<Role>,
) -> Result<(), MutationError> {
    match actor_role {
        Role::Owner => Ok(()),
        Role::Admin
            if target_current != Some(Role::Owner) && target_new != Some(Role::Owner) =>
        {
            Ok(())
        }
        _ => Err(MutationError::InsufficientRole),
    }
}

/// Ordinary users cannot modify autogenerated ones.
pub(crate) fn check_autogenerated(actor: &Identity, target: &User) -> Result<(), MutationError> {
    if target.autogenerated && !actor.user.autogenerated {
        return Err(MutationError::InsufficientRole);
    }
    Ok(())
}

pub(crate) fn already_exists(entity: &'static str) -> impl FnOnce(Error) -> MutationError {
    move |e| match e {
        Error::AlreadyExists => MutationError::AlreadyExists(entity),
        other => MutationError::Store(other),
    }
}
