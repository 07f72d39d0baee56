use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::PasswordHasher;
use crate::error::{AccountError, Error};
use crate::store::Snapshot;
use crate::types::{Identity, Token, TokenType, User};
use crate::validation::{normalize_email, validate_username};

const AUTH_TYPE_PASSWORD: &str = "password";

/// Signup request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub application_id: Option<Uuid>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub autogenerated: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Properties of a token issued at login.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenOptions {
    pub token_type: TokenType,
    pub restricted: bool,
    pub note: Option<String>,
}

/// Changes to a token's descriptive fields. At least one must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenUpdate {
    pub token_type: Option<TokenType>,
    pub note: Option<String>,
}

/// Hashes a password, reporting weak input as a parameter error.
pub fn hash_password(hasher: &PasswordHasher, password: &str) -> Result<String, AccountError> {
    hasher.hash(password).map_err(|e| match e {
        Error::BadRequest(msg) => AccountError::InvalidParameters(msg),
        other => AccountError::Store(other),
    })
}

/// Validates a signup request and hashes its password. Runs outside any
/// transaction since hashing is slow.
pub fn prepare_user(hasher: &PasswordHasher, new: NewUser) -> Result<User, AccountError> {
    let username = new.username.trim().to_lowercase();
    validate_username(&username).map_err(AccountError::InvalidParameters)?;
    let normalized_email = normalize_email(&new.email).map_err(AccountError::InvalidParameters)?;

    let password_hash = hash_password(hasher, &new.password)?;

    let now = Utc::now();
    Ok(User {
        id: Uuid::new_v4(),
        username,
        normalized_email,
        password_hash,
        auth_type: AUTH_TYPE_PASSWORD.to_string(),
        verified: new.verified,
        autogenerated: new.autogenerated,
        application_id: new.application_id,
        first_name: new.first_name,
        last_name: new.last_name,
        created_at: now,
        updated_at: now,
    })
}

/// Stores a prepared user. Username and email are unique per application.
pub fn insert_user(store: &dyn Snapshot, user: User) -> Result<User, AccountError> {
    if let Some(application_id) = user.application_id {
        if store.get_application(application_id)?.is_none() {
            return Err(AccountError::InvalidParameters(format!(
                "application {application_id} does not exist"
            )));
        }
    }

    store.create_user(&user).map_err(|e| match e {
        Error::AlreadyExists => AccountError::UserAlreadyExists,
        other => AccountError::Store(other),
    })?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        application_id = ?user.application_id,
        "User created"
    );
    Ok(user)
}

/// Looks a user up by username, falling back to email.
pub fn find_login_user(
    store: &dyn Snapshot,
    login: &str,
    application_id: Option<Uuid>,
) -> Result<User, AccountError> {
    let login = login.trim().to_lowercase();
    if let Some(user) = store.get_user_by_username(&login, application_id)? {
        return Ok(user);
    }
    store
        .get_user_by_email(&login, application_id)?
        .ok_or(AccountError::UserNotFound)
}

pub fn issue_token(
    store: &dyn Snapshot,
    user: &User,
    options: TokenOptions,
) -> Result<Token, AccountError> {
    let now = Utc::now();
    let token = Token {
        id: Uuid::new_v4(),
        user_id: user.id,
        active: true,
        token_type: options.token_type,
        restricted: options.restricted,
        note: options.note,
        created_at: now,
        updated_at: now,
    };
    store.create_token(&token)?;

    tracing::info!(
        user_id = %user.id,
        restricted = token.restricted,
        token_type = token.token_type.as_str(),
        "Token issued"
    );
    Ok(token)
}

/// Deactivates one of the actor's tokens, the presented one by default.
pub fn revoke_token(
    store: &dyn Snapshot,
    actor: &Identity,
    target: Option<Uuid>,
) -> Result<Token, AccountError> {
    let mut token = owned_token(store, actor, target)?;

    store.deactivate_token(token.id)?;
    token.active = false;

    tracing::info!(
        user_id = %actor.user_id(),
        token_id = %token.id,
        "Token revoked"
    );
    Ok(token)
}

/// Loads one of the actor's own tokens, the presented one by default.
fn owned_token(
    store: &dyn Snapshot,
    actor: &Identity,
    target: Option<Uuid>,
) -> Result<Token, AccountError> {
    if actor.is_restricted() {
        return Err(AccountError::RestrictedToken);
    }

    let target = target.unwrap_or(actor.token.id);
    let token = store
        .get_token(target)?
        .ok_or(AccountError::TokenNotFound)?;
    if token.user_id != actor.user_id() {
        return Err(AccountError::NotTokenOwner);
    }
    Ok(token)
}

pub fn update_token(
    store: &dyn Snapshot,
    actor: &Identity,
    target: Option<Uuid>,
    update: TokenUpdate,
) -> Result<Token, AccountError> {
    if update.token_type.is_none() && update.note.is_none() {
        return Err(AccountError::InvalidParameters(
            "token_type or note must be given".to_string(),
        ));
    }
    let mut token = owned_token(store, actor, target)?;

    if let Some(token_type) = update.token_type {
        token.token_type = token_type;
    }
    if let Some(note) = update.note {
        token.note = Some(note);
    }
    store.update_token(token.id, token.token_type, token.note.as_deref())?;
    token.updated_at = Utc::now();

    tracing::info!(
        user_id = %actor.user_id(),
        token_id = %token.id,
        token_type = token.token_type.as_str(),
        "Token updated"
    );
    Ok(token)
}
