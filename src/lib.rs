//! # Roost
//!
//! Identity, group-membership, and resource-authorization engine, usable
//! both as a standalone server and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! roost = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use roost::config::EngineConfig;
//! use roost::engine::Engine;
//! use roost::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/roost.db").unwrap();
//! store.initialize().unwrap();
//!
//! let engine = Engine::new(Arc::new(store), EngineConfig::default());
//! let identity = engine.authenticate(&["Bearer 8d6c..."])?;
//! let permissions = engine.resolve_permissions(&identity, resource_id)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `roost` binary. Disable with `default-features = false`.

pub mod access;
pub mod accounts;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod server;
pub mod store;
pub mod types;
pub mod validation;
