use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{
    already_exists, check_authority, check_autogenerated, ensure_unrestricted, require_role,
};
use crate::access::member_role;
use crate::config::EngineConfig;
use crate::error::MutationError;
use crate::store::Snapshot;
use crate::types::{Group, GroupMembership, Identity, Role, Subscription, User};
use crate::validation::validate_group_name;

/// Creates a group owned by the actor, enforcing the actor's group limit.
pub fn create_group(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    name: &str,
    parent: Option<Uuid>,
) -> Result<Group, MutationError> {
    ensure_unrestricted(actor)?;
    validate_group_name(name).map_err(MutationError::InvalidParameters)?;

    let user_id = actor.user_id();
    let owned = store.count_owned_groups(user_id)?;
    let limit = store
        .get_user_group_limit(user_id)?
        .map_or(config.default_group_limit, |l| l.group_limit);
    if owned >= limit {
        return Err(MutationError::GroupLimitExceeded { owned, limit });
    }

    if let Some(parent_id) = parent {
        store
            .get_group(parent_id)?
            .ok_or(MutationError::NotFound("parent group"))?;
        if !require_role(store, actor, parent_id)?.can_manage_members() {
            return Err(MutationError::InsufficientRole);
        }
    }

    let now = Utc::now();
    let group = Group {
        id: Uuid::new_v4(),
        name: name.to_string(),
        autogenerated: actor.user.autogenerated,
        parent,
        created_at: now,
        updated_at: now,
    };
    store
        .create_group(&group)
        .map_err(already_exists("group"))?;
    store.upsert_membership(&GroupMembership {
        group_id: group.id,
        user_id,
        user_type: Role::Owner,
    })?;

    if parent.is_none() {
        if let Some(plan_id) = config.free_plan_id {
            let plan = store
                .get_subscription_plan(plan_id)?
                .ok_or(MutationError::NotFound("free subscription plan"))?;
            store.upsert_subscription(&Subscription {
                group_id: group.id,
                subscription_plan_id: plan.id,
                active: true,
                units: plan.default_units,
            })?;
        }
    }

    tracing::info!(
        group_id = %group.id,
        owner = %user_id,
        parent = ?group.parent,
        "Group created"
    );
    Ok(group)
}

/// Adds a user to a group or changes its role.
pub fn set_membership(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    group_id: Uuid,
    target_user_id: Uuid,
    role: Role,
) -> Result<GroupMembership, MutationError> {
    ensure_unrestricted(actor)?;

    let group = store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    let target = store
        .get_user(target_user_id)?
        .ok_or(MutationError::NotFound("user"))?;

    let actor_role = require_role(store, actor, group_id)?;
    let current = member_role(store, group_id, target.id)?;
    check_authority(actor_role, current, Some(role))?;
    check_autogenerated(actor, &target)?;

    if current.is_none() {
        if let Some(parent_id) = group.parent {
            if member_role(store, parent_id, target.id)?.is_none() {
                return Err(MutationError::ParentMembershipRequired);
            }
        }
        ensure_seat_available(store, config, &group, &target)?;
    }

    let membership = GroupMembership {
        group_id,
        user_id: target.id,
        user_type: role,
    };
    store.upsert_membership(&membership)?;

    tracing::info!(
        group_id = %group_id,
        user_id = %target.id,
        role = %role,
        previous = ?current,
        actor = %actor.user_id(),
        "Membership set"
    );
    Ok(membership)
}

/// Seats are counted on the top group of the tree slice. A user who is
/// already a member there does not take a new seat.
fn ensure_seat_available(
    store: &dyn Snapshot,
    config: &EngineConfig,
    group: &Group,
    target: &User,
) -> Result<(), MutationError> {
    if target.autogenerated {
        return Ok(());
    }

    let mut capacity = store.active_units(group.id, &config.seat_plan_type)?;
    if let Some(parent_id) = group.parent {
        if let Some(units) = store.active_units(parent_id, &config.seat_plan_type)? {
            capacity = Some(capacity.unwrap_or(0) + units);
        }
    }
    let Some(capacity) = capacity else {
        return Ok(());
    };

    let top_group = group.parent.unwrap_or(group.id);
    if top_group != group.id && member_role(store, top_group, target.id)?.is_some() {
        return Ok(());
    }

    let seated = store.count_human_members(top_group)?;
    if seated >= capacity {
        tracing::info!(
            group_id = %group.id,
            seated,
            capacity,
            "Denied: no free seats"
        );
        return Err(MutationError::SeatLimitExceeded);
    }
    Ok(())
}

/// Removes a user from a group and from the group's direct children.
pub fn remove_member(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Uuid,
    target_user_id: Uuid,
) -> Result<(), MutationError> {
    ensure_unrestricted(actor)?;

    store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    let membership = store
        .get_membership(group_id, target_user_id)?
        .ok_or(MutationError::NotFound("membership"))?;

    if target_user_id != actor.user_id() {
        let actor_role = require_role(store, actor, group_id)?;
        check_authority(actor_role, Some(membership.user_type), None)?;
        if let Some(target) = store.get_user(target_user_id)? {
            check_autogenerated(actor, &target)?;
        }
    }

    store.delete_membership(group_id, target_user_id)?;
    for child in store.list_child_groups(group_id)? {
        if store.delete_membership(child.id, target_user_id)? {
            tracing::debug!(
                group_id = %child.id,
                user_id = %target_user_id,
                "Removed from child group"
            );
        }
    }

    tracing::info!(
        group_id = %group_id,
        user_id = %target_user_id,
        actor = %actor.user_id(),
        "Member removed"
    );
    Ok(())
}

/// Moves a group under a new parent, or to the top level with `None`.
pub fn reparent_group(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    group_id: Uuid,
    new_parent: Option<Uuid>,
) -> Result<Group, MutationError> {
    ensure_unrestricted(actor)?;

    let mut group = store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    if require_role(store, actor, group_id)? != Role::Owner {
        return Err(MutationError::InsufficientRole);
    }

    if let Some(parent_id) = new_parent {
        if parent_id == group_id {
            return Err(MutationError::CyclicParent);
        }
        store
            .get_group(parent_id)?
            .ok_or(MutationError::NotFound("parent group"))?;
        if !require_role(store, actor, parent_id)?.can_manage_members() {
            return Err(MutationError::InsufficientRole);
        }
        ensure_acyclic(store, group_id, parent_id, config.max_group_depth)?;
    }

    store
        .set_group_parent(group_id, new_parent)
        .map_err(already_exists("group"))?;

    tracing::info!(
        group_id = %group_id,
        from = ?group.parent,
        to = ?new_parent,
        "Group re-parented"
    );
    group.parent = new_parent;
    Ok(group)
}

/// Renames a group. Owners and admins only; names stay unique among siblings.
pub fn rename_group(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Uuid,
    name: &str,
) -> Result<Group, MutationError> {
    ensure_unrestricted(actor)?;
    validate_group_name(name).map_err(MutationError::InvalidParameters)?;

    let mut group = store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    if !require_role(store, actor, group_id)?.can_manage_members() {
        return Err(MutationError::InsufficientRole);
    }

    store
        .rename_group(group_id, name)
        .map_err(already_exists("group"))?;

    tracing::info!(
        group_id = %group_id,
        from = %group.name,
        to = %name,
        actor = %actor.user_id(),
        "Group renamed"
    );
    group.name = name.to_string();
    group.updated_at = Utc::now();
    Ok(group)
}

/// A group as seen by one of its members.
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub role: Role,
    pub subscriptions: Vec<Subscription>,
}

pub fn group_details(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Uuid,
) -> Result<GroupDetails, MutationError> {
    let group = store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    let role = require_role(store, actor, group_id)?;
    let subscriptions = store.list_group_subscriptions(group_id)?;
    Ok(GroupDetails {
        group,
        role,
        subscriptions,
    })
}

/// Walks the ancestors of `parent_id`. Meeting `group_id` on the way up
/// means the new link would close a loop.
fn ensure_acyclic(
    store: &dyn Snapshot,
    group_id: Uuid,
    parent_id: Uuid,
    max_depth: usize,
) -> Result<(), MutationError> {
    let mut current = Some(parent_id);
    let mut depth = 0;
    while let Some(id) = current {
        if id == group_id {
            return Err(MutationError::CyclicParent);
        }
        depth += 1;
        if depth > max_depth {
            return Err(MutationError::CyclicParent);
        }
        current = store.get_group(id)?.and_then(|g| g.parent);
    }
    Ok(())
}

/// Deletes a group. Children are orphaned, applications cascade.
pub fn delete_group(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Uuid,
) -> Result<Group, MutationError> {
    ensure_unrestricted(actor)?;

    let group = store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    if require_role(store, actor, group_id)? != Role::Owner {
        return Err(MutationError::InsufficientRole);
    }
    if group.autogenerated && !actor.user.autogenerated {
        return Err(MutationError::InsufficientRole);
    }

    store.delete_group(group_id)?;

    tracing::info!(group_id = %group_id, actor = %actor.user_id(), "Group deleted");
    Ok(group)
}
