mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::*;

/// Users, tokens, groups and group memberships.
pub trait IdentityStore {
    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    fn get_user_by_username(
        &self,
        username: &str,
        application_id: Option<Uuid>,
    ) -> Result<Option<User>>;
    fn get_user_by_email(
        &self,
        normalized_email: &str,
        application_id: Option<Uuid>,
    ) -> Result<Option<User>>;
    fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token(&self, id: Uuid) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: Uuid) -> Result<Vec<Token>>;
    fn deactivate_token(&self, id: Uuid) -> Result<bool>;
    fn update_token(&self, id: Uuid, token_type: TokenType, note: Option<&str>) -> Result<()>;

    // Group operations
    fn create_group(&self, group: &Group) -> Result<()>;
    fn get_group(&self, id: Uuid) -> Result<Option<Group>>;
    fn list_child_groups(&self, parent: Uuid) -> Result<Vec<Group>>;
    fn set_group_parent(&self, id: Uuid, parent: Option<Uuid>) -> Result<()>;
    fn rename_group(&self, id: Uuid, name: &str) -> Result<()>;
    fn delete_group(&self, id: Uuid) -> Result<bool>;

    // Membership operations
    fn upsert_membership(&self, membership: &GroupMembership) -> Result<()>;
    fn get_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupMembership>>;
    fn delete_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<bool>;
    fn list_user_memberships(&self, user_id: Uuid) -> Result<Vec<GroupMembership>>;
    fn list_group_members(&self, group_id: Uuid) -> Result<Vec<GroupMembership>>;
    fn count_owned_groups(&self, user_id: Uuid) -> Result<i64>;
    /// Counts members of a group that are not autogenerated users.
    fn count_human_members(&self, group_id: Uuid) -> Result<i64>;
}

/// Applications, resources, permission definitions and holder grants.
pub trait ResourceStore {
    // Application operations
    fn create_application(&self, app: &Application) -> Result<()>;
    fn get_application(&self, id: Uuid) -> Result<Option<Application>>;
    fn list_group_applications(&self, group_id: Uuid) -> Result<Vec<Application>>;
    fn delete_application(&self, id: Uuid) -> Result<bool>;

    // Resource operations
    fn create_resource(&self, resource: &Resource) -> Result<()>;
    fn get_resource(&self, id: Uuid) -> Result<Option<Resource>>;
    fn update_resource_data(&self, id: Uuid, data: &serde_json::Value) -> Result<()>;
    fn delete_resource(&self, id: Uuid) -> Result<bool>;
    fn list_application_resources(&self, application_id: Uuid) -> Result<Vec<Resource>>;
    /// Resources with at least one grant to the user or any of the groups.
    fn list_granted_resources(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
        application_id: Option<Uuid>,
    ) -> Result<Vec<Resource>>;

    // Permission definitions
    /// Returns the named permission of a resource, defining it if missing.
    fn ensure_permission(&self, resource_id: Uuid, name: &str) -> Result<ResourcePermission>;
    fn get_permission_by_name(
        &self,
        resource_id: Uuid,
        name: &str,
    ) -> Result<Option<ResourcePermission>>;
    fn list_resource_permissions(&self, resource_id: Uuid) -> Result<Vec<ResourcePermission>>;

    // Holder grants
    /// Returns false when the grant already existed.
    fn insert_holder_permission(&self, grant: &ResourceHolderPermission) -> Result<bool>;
    fn delete_holder_permission(
        &self,
        holder: Holder,
        resource_id: Uuid,
        permission_id: Uuid,
    ) -> Result<bool>;
    /// Permission names granted on a resource to the user or any of the groups.
    fn list_granted_permission_names(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Vec<String>>;
    fn list_resource_grants(&self, resource_id: Uuid) -> Result<Vec<(Holder, String)>>;
}

/// Subscription plans, subscriptions and per-user group limits.
pub trait QuotaStore {
    fn create_subscription_plan(&self, plan: &SubscriptionPlan) -> Result<()>;
    fn get_subscription_plan(&self, id: Uuid) -> Result<Option<SubscriptionPlan>>;
    fn upsert_subscription(&self, subscription: &Subscription) -> Result<()>;
    fn list_group_subscriptions(&self, group_id: Uuid) -> Result<Vec<Subscription>>;
    /// Sum of units over a group's active subscriptions to plans of `plan_type`.
    /// None when the group has no such active subscription.
    fn active_units(&self, group_id: Uuid, plan_type: &str) -> Result<Option<i64>>;
    fn get_user_group_limit(&self, user_id: Uuid) -> Result<Option<UserGroupLimit>>;
    fn set_user_group_limit(&self, user_id: Uuid, group_limit: i64) -> Result<()>;
}

/// A consistent view of every store, valid for one transaction.
pub trait Snapshot: IdentityStore + ResourceStore + QuotaStore {}

impl<T: IdentityStore + ResourceStore + QuotaStore + ?Sized> Snapshot for T {}

/// Store defines the transactional boundary the engine runs against.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Runs `f` against a read snapshot.
    fn read<T, E>(&self, f: impl FnOnce(&dyn Snapshot) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<Error>;

    /// Runs `f` inside a write transaction. Commits when `f` returns `Ok`,
    /// rolls back otherwise.
    fn write<T, E>(&self, f: impl FnOnce(&dyn Snapshot) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<Error>;
}
