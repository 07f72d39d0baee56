use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::{self, Resolution, ResourceFilter};
use crate::accounts::{self, NewUser, TokenOptions, TokenUpdate};
use crate::auth::{self, PasswordHasher};
use crate::config::EngineConfig;
use crate::error::{AccountError, AuthError, Error, MutationError, ResolveError, Result};
use crate::guard::{self, GrantReport, GroupDetails, RevokeReport};
use crate::store::Store;
use crate::types::*;

/// Catalog entry for a subscription plan.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub plan_type: String,
    #[serde(default)]
    pub default_units: i64,
    #[serde(default)]
    pub public: bool,
}

/// The authorization engine. Every operation runs in its own store
/// transaction; the engine keeps no state between calls.
pub struct Engine<S> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
    hasher: Arc<PasswordHasher>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            hasher: Arc::new(PasswordHasher::new()),
        }
    }

    #[must_use]
    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Token Authenticator

    pub fn authenticate<T: AsRef<str>>(
        &self,
        candidates: &[T],
    ) -> std::result::Result<Identity, AuthError> {
        let result = self.store.read(|s| {
            auth::authenticate(s, candidates, self.config.max_credentials)
        });
        if let Err(e) = &result {
            tracing::warn!(error = %e, presented = candidates.len(), "Authentication rejected");
        }
        result
    }

    // Permission Resolver

    pub fn explain_permissions(
        &self,
        identity: &Identity,
        resource_id: Uuid,
    ) -> std::result::Result<Resolution, ResolveError> {
        self.store.read(|s| {
            access::resolve(s, identity, resource_id, &self.config.read_only_permissions)
        })
    }

    pub fn resolve_permissions(
        &self,
        identity: &Identity,
        resource_id: Uuid,
    ) -> std::result::Result<PermissionSet, ResolveError> {
        Ok(self.explain_permissions(identity, resource_id)?.effective)
    }

    pub fn has_permission(
        &self,
        identity: &Identity,
        resource_id: Uuid,
        permission: &str,
    ) -> std::result::Result<bool, ResolveError> {
        Ok(self
            .resolve_permissions(identity, resource_id)?
            .has(permission))
    }

    /// Resources the identity can reach, narrowed by `filter`.
    pub fn list_resources(
        &self,
        identity: &Identity,
        filter: &ResourceFilter,
    ) -> std::result::Result<Vec<Resource>, ResolveError> {
        self.store.read(|s| {
            access::list_resources(s, identity, filter, &self.config.read_only_permissions)
        })
    }

    // Groups

    pub fn create_group(
        &self,
        identity: &Identity,
        name: &str,
        parent: Option<Uuid>,
    ) -> std::result::Result<Group, MutationError> {
        self.store
            .write(|s| guard::create_group(s, &self.config, identity, name, parent))
    }

    pub fn set_membership(
        &self,
        identity: &Identity,
        group_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> std::result::Result<GroupMembership, MutationError> {
        self.store.write(|s| {
            guard::set_membership(s, &self.config, identity, group_id, user_id, role)
        })
    }

    pub fn remove_member(
        &self,
        identity: &Identity,
        group_id: Uuid,
        user_id: Uuid,
    ) -> std::result::Result<(), MutationError> {
        self.store
            .write(|s| guard::remove_member(s, identity, group_id, user_id))
    }

    pub fn reparent_group(
        &self,
        identity: &Identity,
        group_id: Uuid,
        parent: Option<Uuid>,
    ) -> std::result::Result<Group, MutationError> {
        self.store
            .write(|s| guard::reparent_group(s, &self.config, identity, group_id, parent))
    }

    pub fn rename_group(
        &self,
        identity: &Identity,
        group_id: Uuid,
        name: &str,
    ) -> std::result::Result<Group, MutationError> {
        self.store
            .write(|s| guard::rename_group(s, identity, group_id, name))
    }

    /// A group with the caller's role and the group's subscriptions.
    pub fn group_details(
        &self,
        identity: &Identity,
        group_id: Uuid,
    ) -> std::result::Result<GroupDetails, MutationError> {
        self.store
            .read(|s| guard::group_details(s, identity, group_id))
    }

    pub fn delete_group(
        &self,
        identity: &Identity,
        group_id: Uuid,
    ) -> std::result::Result<Group, MutationError> {
        self.store
            .write(|s| guard::delete_group(s, identity, group_id))
    }

    /// Groups the identity belongs to, with its role in each.
    pub fn memberships(&self, identity: &Identity) -> Result<Vec<GroupMembership>> {
        self.store
            .read(|s| s.list_user_memberships(identity.user_id()))
    }

    /// Members of a group. Only visible to its members.
    pub fn group_members(
        &self,
        identity: &Identity,
        group_id: Uuid,
    ) -> std::result::Result<Vec<GroupMembership>, MutationError> {
        self.store.read(|s| {
            s.get_group(group_id)?
                .ok_or(MutationError::NotFound("group"))?;
            guard::require_role(s, identity, group_id)?;
            Ok(s.list_group_members(group_id)?)
        })
    }

    // Grants

    pub fn grant_permission(
        &self,
        identity: &Identity,
        resource_id: Uuid,
        holder: Holder,
        permissions: &[String],
    ) -> std::result::Result<Vec<GrantReport>, MutationError> {
        self.store.write(|s| {
            guard::grant_permissions(s, &self.config, identity, resource_id, holder, permissions)
        })
    }

    pub fn revoke_permission(
        &self,
        identity: &Identity,
        resource_id: Uuid,
        holder: Holder,
        permissions: &[String],
    ) -> std::result::Result<Vec<RevokeReport>, MutationError> {
        self.store.write(|s| {
            guard::revoke_permissions(s, &self.config, identity, resource_id, holder, permissions)
        })
    }

    pub fn resource_holders(
        &self,
        identity: &Identity,
        resource_id: Uuid,
    ) -> std::result::Result<Vec<ResourceHolder>, MutationError> {
        self.store
            .read(|s| guard::resource_holders(s, &self.config, identity, resource_id))
    }

    // Applications and resources

    pub fn create_application(
        &self,
        identity: &Identity,
        group_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> std::result::Result<Application, MutationError> {
        self.store
            .write(|s| guard::create_application(s, identity, group_id, name, description))
    }

    pub fn get_application(
        &self,
        identity: &Identity,
        application_id: Uuid,
    ) -> std::result::Result<Application, MutationError> {
        self.store
            .read(|s| guard::get_application(s, identity, application_id))
    }

    pub fn list_applications(
        &self,
        identity: &Identity,
        group_id: Option<Uuid>,
    ) -> std::result::Result<Vec<Application>, MutationError> {
        self.store
            .read(|s| guard::list_applications(s, identity, group_id))
    }

    pub fn delete_application(
        &self,
        identity: &Identity,
        application_id: Uuid,
    ) -> std::result::Result<Application, MutationError> {
        self.store
            .write(|s| guard::delete_application(s, identity, application_id))
    }

    pub fn create_resource(
        &self,
        identity: &Identity,
        application_id: Uuid,
        data: Value,
    ) -> std::result::Result<Resource, MutationError> {
        self.store
            .write(|s| guard::create_resource(s, identity, application_id, data))
    }

    /// Reads a resource. Requires `read`, which restricted tokens keep.
    pub fn get_resource(
        &self,
        identity: &Identity,
        resource_id: Uuid,
    ) -> std::result::Result<Resource, MutationError> {
        self.store.read(|s| {
            guard::require_permission(
                s,
                &self.config,
                identity,
                resource_id,
                crate::types::permission::READ,
            )
        })
    }

    pub fn update_resource_data(
        &self,
        identity: &Identity,
        resource_id: Uuid,
        update: Map<String, Value>,
        drop_keys: &[String],
    ) -> std::result::Result<Resource, MutationError> {
        self.store.write(|s| {
            guard::update_resource_data(s, &self.config, identity, resource_id, update, drop_keys)
        })
    }

    pub fn delete_resource(
        &self,
        identity: &Identity,
        resource_id: Uuid,
    ) -> std::result::Result<Resource, MutationError> {
        self.store
            .write(|s| guard::delete_resource(s, &self.config, identity, resource_id))
    }

    // Accounts and tokens

    pub fn create_user(&self, new: NewUser) -> std::result::Result<User, AccountError> {
        let user = accounts::prepare_user(&self.hasher, new)?;
        self.store.write(|s| accounts::insert_user(s, user))
    }

    /// Verifies a password and issues a fresh active token.
    pub fn login(
        &self,
        login: &str,
        password: &str,
        application_id: Option<Uuid>,
        options: TokenOptions,
    ) -> std::result::Result<Token, AccountError> {
        let user = self
            .store
            .read(|s| accounts::find_login_user(s, login, application_id))?;
        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Login rejected: incorrect password");
            return Err(AccountError::IncorrectPassword);
        }
        self.store
            .write(|s| accounts::issue_token(s, &user, options))
    }

    pub fn revoke_token(
        &self,
        identity: &Identity,
        target: Option<Uuid>,
    ) -> std::result::Result<Token, AccountError> {
        self.store
            .write(|s| accounts::revoke_token(s, identity, target))
    }

    pub fn update_token(
        &self,
        identity: &Identity,
        target: Option<Uuid>,
        update: TokenUpdate,
    ) -> std::result::Result<Token, AccountError> {
        self.store
            .write(|s| accounts::update_token(s, identity, target, update))
    }

    /// Replaces the caller's password after checking the current one.
    /// Existing tokens stay valid.
    pub fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
    ) -> std::result::Result<User, AccountError> {
        if identity.is_restricted() {
            return Err(AccountError::RestrictedToken);
        }
        let mut user = self.store.read(|s| {
            s.get_user(identity.user_id())?
                .ok_or(AccountError::UserNotFound)
        })?;
        if !self.hasher.verify(current_password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Password change rejected: incorrect password");
            return Err(AccountError::IncorrectPassword);
        }

        let password_hash = accounts::hash_password(&self.hasher, new_password)?;
        self.store
            .write(|s| s.set_password_hash(user.id, &password_hash))?;
        user.password_hash = password_hash;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(user)
    }

    pub fn list_tokens(&self, identity: &Identity) -> Result<Vec<Token>> {
        self.store
            .read(|s| s.list_user_tokens(identity.user_id()))
    }

    // Quota ledger facts, fed by operators and billing

    pub fn set_user_group_limit(&self, user_id: Uuid, limit: i64) -> Result<()> {
        if limit < 0 {
            return Err(Error::BadRequest("group limit cannot be negative".to_string()));
        }
        self.store.write(|s| {
            s.get_user(user_id)?.ok_or(Error::NotFound)?;
            s.set_user_group_limit(user_id, limit)
        })?;
        tracing::info!(user_id = %user_id, limit, "User group limit set");
        Ok(())
    }

    pub fn create_subscription_plan(&self, new: NewPlan) -> Result<SubscriptionPlan> {
        if new.name.trim().is_empty() || new.plan_type.trim().is_empty() {
            return Err(Error::BadRequest(
                "plan name and type cannot be empty".to_string(),
            ));
        }
        let plan = SubscriptionPlan {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            default_units: new.default_units,
            plan_type: new.plan_type,
            public: new.public,
        };
        self.store.write(|s| s.create_subscription_plan(&plan))?;
        tracing::info!(plan_id = %plan.id, plan_type = %plan.plan_type, "Subscription plan created");
        Ok(plan)
    }

    pub fn set_subscription(
        &self,
        group_id: Uuid,
        plan_id: Uuid,
        units: i64,
        active: bool,
    ) -> std::result::Result<Subscription, MutationError> {
        if units < 0 {
            return Err(MutationError::InvalidParameters(
                "units cannot be negative".to_string(),
            ));
        }
        let subscription = Subscription {
            group_id,
            subscription_plan_id: plan_id,
            active,
            units,
        };
        self.store.write(|s| {
            s.get_group(group_id)?
                .ok_or(MutationError::NotFound("group"))?;
            s.get_subscription_plan(plan_id)?
                .ok_or(MutationError::NotFound("subscription plan"))?;
            s.upsert_subscription(&subscription)?;
            Ok::<_, MutationError>(())
        })?;
        tracing::info!(
            group_id = %group_id,
            plan_id = %plan_id,
            units,
            active,
            "Subscription set"
        );
        Ok(subscription)
    }

    /// Units a group holds across active subscriptions of a plan type.
    pub fn active_units(&self, group_id: Uuid, plan_type: &str) -> Result<i64> {
        Ok(self
            .store
            .read(|s| s.active_units(group_id, plan_type))?
            .unwrap_or(0))
    }
}
