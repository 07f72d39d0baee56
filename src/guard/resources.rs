use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{already_exists, ensure_unrestricted, require_permission, require_role};
use crate::config::EngineConfig;
use crate::error::MutationError;
use crate::store::Snapshot;
use crate::types::permission::{self, STANDARD_PERMISSIONS};
use crate::types::{Application, Holder, Identity, Resource, ResourceHolderPermission};
use crate::validation::validate_application_name;

pub fn create_application(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<Application, MutationError> {
    ensure_unrestricted(actor)?;
    validate_application_name(name).map_err(MutationError::InvalidParameters)?;

    store
        .get_group(group_id)?
        .ok_or(MutationError::NotFound("group"))?;
    if !require_role(store, actor, group_id)?.can_manage_members() {
        return Err(MutationError::InsufficientRole);
    }

    let app = Application {
        id: Uuid::new_v4(),
        group_id,
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: Utc::now(),
    };
    store
        .create_application(&app)
        .map_err(already_exists("application"))?;

    tracing::info!(
        application_id = %app.id,
        group_id = %group_id,
        actor = %actor.user_id(),
        "Application created"
    );
    Ok(app)
}

/// Any member of the owning group may read an application.
pub fn get_application(
    store: &dyn Snapshot,
    actor: &Identity,
    application_id: Uuid,
) -> Result<Application, MutationError> {
    let app = store
        .get_application(application_id)?
        .ok_or(MutationError::NotFound("application"))?;
    require_role(store, actor, app.group_id)?;
    Ok(app)
}

/// Applications of one group, or of every group the actor belongs to.
pub fn list_applications(
    store: &dyn Snapshot,
    actor: &Identity,
    group_id: Option<Uuid>,
) -> Result<Vec<Application>, MutationError> {
    let group_ids = match group_id {
        Some(group_id) => {
            store
                .get_group(group_id)?
                .ok_or(MutationError::NotFound("group"))?;
            require_role(store, actor, group_id)?;
            vec![group_id]
        }
        None => store
            .list_user_memberships(actor.user_id())?
            .into_iter()
            .map(|m| m.group_id)
            .collect(),
    };

    let mut apps = Vec::new();
    for group_id in group_ids {
        apps.extend(store.list_group_applications(group_id)?);
    }
    Ok(apps)
}

/// Deletes an application with its resources and their grants.
pub fn delete_application(
    store: &dyn Snapshot,
    actor: &Identity,
    application_id: Uuid,
) -> Result<Application, MutationError> {
    ensure_unrestricted(actor)?;

    let app = store
        .get_application(application_id)?
        .ok_or(MutationError::NotFound("application"))?;
    if !require_role(store, actor, app.group_id)?.can_manage_members() {
        return Err(MutationError::InsufficientRole);
    }

    store.delete_application(app.id)?;

    tracing::info!(
        application_id = %app.id,
        actor = %actor.user_id(),
        "Application deleted"
    );
    Ok(app)
}

/// Creates a resource under an application. The creator and the owning
/// group receive every standard permission on it.
pub fn create_resource(
    store: &dyn Snapshot,
    actor: &Identity,
    application_id: Uuid,
    data: Value,
) -> Result<Resource, MutationError> {
    ensure_unrestricted(actor)?;
    if !data.is_object() {
        return Err(MutationError::InvalidParameters(
            "resource_data must be a JSON object".to_string(),
        ));
    }

    let app = store
        .get_application(application_id)?
        .ok_or(MutationError::NotFound("application"))?;
    require_role(store, actor, app.group_id)?;

    let now = Utc::now();
    let resource = Resource {
        id: Uuid::new_v4(),
        application_id: app.id,
        resource_data: data,
        created_at: now,
        updated_at: now,
    };
    store.create_resource(&resource)?;

    let holders = [Holder::User(actor.user_id()), Holder::Group(app.group_id)];
    for name in STANDARD_PERMISSIONS {
        let definition = store.ensure_permission(resource.id, name)?;
        for holder in holders {
            store.insert_holder_permission(&ResourceHolderPermission {
                id: Uuid::new_v4(),
                holder,
                resource_id: resource.id,
                permission_id: definition.id,
                created_at: now,
            })?;
        }
    }

    tracing::info!(
        resource_id = %resource.id,
        application_id = %app.id,
        actor = %actor.user_id(),
        "Resource created"
    );
    Ok(resource)
}

/// Merges `update` into the resource's data, then removes `drop_keys`.
/// A key named in both ends up removed.
pub fn update_resource_data(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    resource_id: Uuid,
    update: Map<String, Value>,
    drop_keys: &[String],
) -> Result<Resource, MutationError> {
    ensure_unrestricted(actor)?;
    let mut resource = require_permission(store, config, actor, resource_id, permission::UPDATE)?;

    let mut data = match resource.resource_data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    data.extend(update);
    for key in drop_keys {
        data.remove(key);
    }

    resource.resource_data = Value::Object(data);
    resource.updated_at = Utc::now();
    store.update_resource_data(resource.id, &resource.resource_data)?;

    tracing::info!(
        resource_id = %resource.id,
        dropped = drop_keys.len(),
        actor = %actor.user_id(),
        "Resource updated"
    );
    Ok(resource)
}

pub fn delete_resource(
    store: &dyn Snapshot,
    config: &EngineConfig,
    actor: &Identity,
    resource_id: Uuid,
) -> Result<Resource, MutationError> {
    ensure_unrestricted(actor)?;
    let resource = require_permission(store, config, actor, resource_id, permission::DELETE)?;

    store.delete_resource(resource.id)?;

    tracing::info!(
        resource_id = %resource.id,
        actor = %actor.user_id(),
        "Resource deleted"
    );
    Ok(resource)
}
