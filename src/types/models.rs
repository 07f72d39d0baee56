use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub normalized_email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub auth_type: String,
    pub verified: bool,
    pub autogenerated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Bugout,
    Slack,
    Github,
}

impl TokenType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenType::Bugout => "bugout",
            TokenType::Slack => "slack",
            TokenType::Github => "github",
        }
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bugout" => Ok(TokenType::Bugout),
            "slack" => Ok(TokenType::Slack),
            "github" => Ok(TokenType::Github),
            other => Err(format!("unknown token type: {other}")),
        }
    }
}

/// A bearer credential. The token id is the bearer value itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub user_id: Uuid,
    pub active: bool,
    pub token_type: TokenType,
    pub restricted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub autogenerated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group role. Variant order is authority order: owner > admin > member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Owners and admins may manage the member list.
    #[must_use]
    pub const fn can_manage_members(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub user_type: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub application_id: Uuid,
    pub resource_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named capability defined on one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePermission {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub permission: String,
}

/// The user or group a grant is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "holder_type", content = "holder_id", rename_all = "lowercase")]
pub enum Holder {
    User(Uuid),
    Group(Uuid),
}

impl Holder {
    #[must_use]
    pub const fn id(self) -> Uuid {
        match self {
            Holder::User(id) | Holder::Group(id) => id,
        }
    }

    #[must_use]
    pub const fn user_id(self) -> Option<Uuid> {
        match self {
            Holder::User(id) => Some(id),
            Holder::Group(_) => None,
        }
    }

    #[must_use]
    pub const fn group_id(self) -> Option<Uuid> {
        match self {
            Holder::Group(id) => Some(id),
            Holder::User(_) => None,
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::User(id) => write!(f, "user:{id}"),
            Holder::Group(id) => write!(f, "group:{id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHolderPermission {
    pub id: Uuid,
    pub holder: Holder,
    pub resource_id: Uuid,
    pub permission_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One holder and the permission names it holds on a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHolder {
    #[serde(flatten)]
    pub holder: Holder,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default_units: i64,
    pub plan_type: String,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub group_id: Uuid,
    pub subscription_plan_id: Uuid,
    pub active: bool,
    pub units: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroupLimit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_limit: i64,
}

/// An authenticated caller: the user and the token it presented.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user: User,
    pub token: Token,
}

impl Identity {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.token.restricted
    }
}
