#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use roost::accounts::{NewUser, TokenOptions};
use roost::auth::PasswordHasher;
use roost::config::EngineConfig;
use roost::engine::Engine;
use roost::store::{SqliteStore, Store};
use roost::types::{Application, Group, Identity, Resource};

pub const PASSWORD: &str = "correct horse battery";

pub fn engine() -> Engine<SqliteStore> {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> Engine<SqliteStore> {
    let store = SqliteStore::open_in_memory().expect("open store");
    store.initialize().expect("initialize schema");
    Engine::new(Arc::new(store), config)
        .with_password_hasher(PasswordHasher::with_cost(8, 1).expect("hasher"))
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: PASSWORD.to_string(),
        application_id: None,
        first_name: None,
        last_name: None,
        autogenerated: false,
        verified: true,
    }
}

pub fn bearer(token_id: Uuid) -> String {
    format!("Bearer {token_id}")
}

/// Creates a user, logs in, and authenticates with the issued token.
pub fn signup(engine: &Engine<SqliteStore>, username: &str) -> Identity {
    engine.create_user(new_user(username)).expect("create user");
    login(engine, username, TokenOptions::default())
}

pub fn login(engine: &Engine<SqliteStore>, username: &str, options: TokenOptions) -> Identity {
    let token = engine
        .login(username, PASSWORD, None, options)
        .expect("login");
    engine
        .authenticate(&[bearer(token.id)])
        .expect("authenticate")
}

pub fn restricted(engine: &Engine<SqliteStore>, username: &str) -> Identity {
    login(
        engine,
        username,
        TokenOptions {
            restricted: true,
            ..TokenOptions::default()
        },
    )
}

/// A group owned by `owner`, an application under it, and one resource.
pub fn resource_tree(
    engine: &Engine<SqliteStore>,
    owner: &Identity,
    group_name: &str,
) -> (Group, Application, Resource) {
    let group = engine
        .create_group(owner, group_name, None)
        .expect("create group");
    let app = engine
        .create_application(owner, group.id, "journal", None)
        .expect("create application");
    let resource = engine
        .create_resource(owner, app.id, json!({ "type": "entry" }))
        .expect("create resource");
    (group, app, resource)
}
