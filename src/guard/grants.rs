use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{ensure_unrestricted, require_permission};
use crate::config::EngineConfig;
use crate::error::MutationError;
use crate::store::Snapshot;
use crate::types::permission::{self, validate_permission_name};
use crate::types::{Holder, Identity, PermissionSet, ResourceHolder, ResourceHolderPermission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOutcome {
    Granted,
    AlreadyGranted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeOutcome {
    Revoked,
    NotGranted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantReport {
    pub permission: String,
    pub outcome: GrantOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokeReport {
    pub permission: String,
    pub outcome: RevokeOutcome,
}

fn requested_names(names: &[String]) -> Result<PermissionSet, MutationError> {
    if names.is_empty() {
        return Err(MutationError::InvalidParameters(
            "at least one permission is required".to_string(),
        ));
    }
    for name in names {
        validate_permission_name(name).map_err(MutationError::InvalidParameters)?;
    }
    Ok(names.iter().map(String::as_str).collect())
}

/// Grants each named permission on a resource to a holder. Missing
/// permission definitions are created on the way.
pub fn grant_permissions(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    resource_id: Uuid,
    holder: Holder,
    names: &[String],
) -> Result<Vec<GrantReport>, MutationError> {
    ensure_unrestricted(actor)?;
    let names = requested_names(names)?;
    let resource = require_permission(store, config, actor, resource_id, permission::ADMIN)?;

    let holder_exists = match holder {
        Holder::User(id) => store.get_user(id)?.is_some(),
        Holder::Group(id) => store.get_group(id)?.is_some(),
    };
    if !holder_exists {
        return Err(MutationError::NotFound(match holder {
            Holder::User(_) => "user",
            Holder::Group(_) => "group",
        }));
    }

    let mut reports = Vec::with_capacity(names.len());
    for name in names {
        let definition = store.ensure_permission(resource.id, &name)?;
        let inserted = store.insert_holder_permission(&ResourceHolderPermission {
            id: Uuid::new_v4(),
            holder,
            resource_id: resource.id,
            permission_id: definition.id,
            created_at: Utc::now(),
        })?;
        let outcome = if inserted {
            GrantOutcome::Granted
        } else {
            GrantOutcome::AlreadyGranted
        };

        tracing::info!(
            resource_id = %resource.id,
            holder = %holder,
            permission = %name,
            outcome = ?outcome,
            actor = %actor.user_id(),
            "Permission grant"
        );
        reports.push(GrantReport {
            permission: name,
            outcome,
        });
    }
    Ok(reports)
}

/// Revokes each named permission from a holder. Names that were never
/// granted are reported, not rejected.
pub fn revoke_permissions(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    resource_id: Uuid,
    holder: Holder,
    names: &[String],
) -> Result<Vec<RevokeReport>, MutationError> {
    ensure_unrestricted(actor)?;
    let names = requested_names(names)?;
    let resource = require_permission(store, config, actor, resource_id, permission::ADMIN)?;

    let mut reports = Vec::with_capacity(names.len());
    for name in names {
        let removed = match store.get_permission_by_name(resource.id, &name)? {
            Some(definition) => {
                store.delete_holder_permission(holder, resource.id, definition.id)?
            }
            None => false,
        };
        let outcome = if removed {
            RevokeOutcome::Revoked
        } else {
            RevokeOutcome::NotGranted
        };

        tracing::info!(
            resource_id = %resource.id,
            holder = %holder,
            permission = %name,
            outcome = ?outcome,
            actor = %actor.user_id(),
            "Permission revoke"
        );
        reports.push(RevokeReport {
            permission: name,
            outcome,
        });
    }
    Ok(reports)
}

/// Every holder with explicit grants on a resource, with its permission names.
pub fn resource_holders(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    resource_id: Uuid,
) -> Result<Vec<ResourceHolder>, MutationError> {
    let resource = require_permission(store, config, actor, resource_id, permission::ADMIN)?;

    // Rows arrive ordered by holder, so each holder's names are contiguous.
    let mut holders: Vec<ResourceHolder> = Vec::new();
    for (holder, name) in store.list_resource_grants(resource.id)? {
        match holders.last_mut() {
            Some(last) if last.holder == holder => last.permissions.push(name),
            _ => holders.push(ResourceHolder {
                holder,
                permissions: vec![name],
            }),
        }
    }
    Ok(holders)
}
