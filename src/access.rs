use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::store::Snapshot;
use crate::types::{GroupMembership, Identity, PermissionSet, Resource, Role};

/// How an identity's permissions on one resource were reached.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub resource: Resource,
    /// Names granted to the user or to one of its groups.
    pub explicit: PermissionSet,
    /// Blanket set from owning the group behind the resource's application.
    pub implicit: PermissionSet,
    /// What the identity may actually exercise.
    pub effective: PermissionSet,
}

/// Resolves the permissions an identity holds on a resource.
///
/// The holder set is the user plus every group it is a direct member of.
/// Grants do not flow down the group tree. Restricted tokens keep only
/// the names listed in `read_only`.
pub fn resolve(
    store: &dyn Snapshot,
    identity: &Identity,
    resource_id: Uuid,
    read_only: &[String],
) -> Result<Resolution, ResolveError> {
    let resource = store
        .get_resource(resource_id)?
        .ok_or(ResolveError::ResourceNotFound)?;
    let memberships = store.list_user_memberships(identity.user_id())?;
    resolve_loaded(store, identity, resource, &memberships, read_only)
}

fn resolve_loaded(
    store: &dyn Snapshot,
    identity: &Identity,
    resource: Resource,
    memberships: &[GroupMembership],
    read_only: &[String],
) -> Result<Resolution, ResolveError> {
    let group_ids: Vec<Uuid> = memberships.iter().map(|m| m.group_id).collect();

    let explicit: PermissionSet = store
        .list_granted_permission_names(resource.id, identity.user_id(), &group_ids)?
        .into_iter()
        .collect();
    let implicit = ownership_permissions(store, &resource, memberships)?;

    let mut effective = explicit.clone().union(&implicit);
    if identity.is_restricted() {
        effective = effective.intersect(read_only);
    }

    tracing::debug!(
        user_id = %identity.user_id(),
        resource_id = %resource.id,
        restricted = identity.is_restricted(),
        permissions = %effective,
        "Resolved permissions"
    );

    Ok(Resolution {
        resource,
        explicit,
        implicit,
        effective,
    })
}

/// Narrows a resource listing.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub application_id: Option<Uuid>,
    /// Top-level `resource_data` keys and the text their values must equal.
    pub data: BTreeMap<String, String>,
}

impl ResourceFilter {
    fn matches(&self, resource: &Resource) -> bool {
        self.data
            .iter()
            .all(|(key, expected)| match resource.resource_data.get(key) {
                Some(Value::String(text)) => text == expected,
                Some(Value::Null) | None => false,
                Some(other) => other.to_string() == *expected,
            })
    }
}

/// Resources on which the identity holds at least one permission, oldest
/// first. Reachability follows the same two paths as [`resolve`].
pub fn list_resources(
    store: &dyn Snapshot,
    identity: &Identity,
    filter: &ResourceFilter,
    read_only: &[String],
) -> Result<Vec<Resource>, ResolveError> {
    let memberships = store.list_user_memberships(identity.user_id())?;
    let group_ids: Vec<Uuid> = memberships.iter().map(|m| m.group_id).collect();

    let mut candidates =
        store.list_granted_resources(identity.user_id(), &group_ids, filter.application_id)?;
    for membership in memberships.iter().filter(|m| m.user_type == Role::Owner) {
        for app in store.list_group_applications(membership.group_id)? {
            if filter.application_id.is_some_and(|id| id != app.id) {
                continue;
            }
            candidates.extend(store.list_application_resources(app.id)?);
        }
    }
    candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    candidates.dedup_by_key(|r| r.id);

    let mut reachable = Vec::with_capacity(candidates.len());
    for resource in candidates {
        if !filter.matches(&resource) {
            continue;
        }
        if identity.is_restricted() {
            let resolution = resolve_loaded(store, identity, resource, &memberships, read_only)?;
            if !resolution.effective.is_empty() {
                reachable.push(resolution.resource);
            }
        } else {
            reachable.push(resource);
        }
    }
    Ok(reachable)
}

/// Owners of the group that holds the resource's application get every
/// permission defined on the resource plus the standard set.
fn ownership_permissions(
    store: &dyn Snapshot,
    resource: &Resource,
    memberships: &[GroupMembership],
) -> Result<PermissionSet, ResolveError> {
    let Some(app) = store.get_application(resource.application_id)? else {
        return Ok(PermissionSet::new());
    };

    let owns = memberships
        .iter()
        .any(|m| m.group_id == app.group_id && m.user_type == Role::Owner);
    if !owns {
        return Ok(PermissionSet::new());
    }

    let defined: PermissionSet = store
        .list_resource_permissions(resource.id)?
        .into_iter()
        .map(|p| p.permission)
        .collect();
    Ok(PermissionSet::standard().union(&defined))
}

/// The role a user holds in a group, if it is a member.
pub fn member_role(
    store: &dyn Snapshot,
    group_id: Uuid,
    user_id: Uuid,
) -> crate::error::Result<Option<Role>> {
    Ok(store
        .get_membership(group_id, user_id)?
        .map(|m| m.user_type))
}
