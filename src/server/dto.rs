use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::ResourceFilter;
use crate::accounts::TokenOptions;
use crate::types::{Holder, Role};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub parent: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReparentGroupRequest {
    pub parent: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RenameGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetMembershipRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub application_id: Uuid,
    #[serde(default = "empty_object")]
    pub resource_data: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Deserialize)]
pub struct UpdateResourceRequest {
    #[serde(default)]
    pub update: Map<String, Value>,
    #[serde(default)]
    pub drop_keys: Vec<String>,
}

/// Grant or revoke body: a holder plus one or more permission names.
#[derive(Debug, Deserialize)]
pub struct HolderPermissionsRequest {
    #[serde(flatten)]
    pub holder: Holder,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub resource_id: Uuid,
    pub permission: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub application_id: Option<Uuid>,
    #[serde(flatten)]
    pub options: TokenOptions,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Builds a resource filter from query parameters. `application_id` selects
/// the application; every other pair must match `resource_data`.
pub fn resource_filter(mut params: BTreeMap<String, String>) -> Result<ResourceFilter, String> {
    let application_id = params
        .remove("application_id")
        .map(|raw| {
            raw.parse::<Uuid>()
                .map_err(|_| format!("invalid application_id: {raw}"))
        })
        .transpose()?;
    Ok(ResourceFilter {
        application_id,
        data: params,
    })
}
