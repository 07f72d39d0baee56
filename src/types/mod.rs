mod models;
pub mod permission;

pub use models::*;
pub use permission::PermissionSet;
