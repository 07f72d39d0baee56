mod authenticator;
mod middleware;
mod password;

pub use authenticator::{Credential, authenticate, parse_credential};
pub use middleware::{AuthRejection, RequireIdentity};
pub use password::PasswordHasher;
