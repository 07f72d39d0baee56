use rusqlite::ErrorCode;
use thiserror::Error;

/// Store-layer error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Only connectivity failures are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::CannotOpen
                        | ErrorCode::SystemIoFailure
                ) =>
            {
                Error::StoreUnavailable(e.to_string())
            }
            _ => Error::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of bearer-token authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials presented")]
    NoCredentials,

    #[error("too many credentials presented ({count}, max {max})")]
    TooManyCredentials { count: usize, max: usize },

    #[error("malformed credential")]
    MalformedCredential,

    #[error("no bearer token presented")]
    NoBearerToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("tokens resolve to different users")]
    AmbiguousIdentity,

    #[error(transparent)]
    Store(#[from] Error),
}

impl AuthError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Store(e) if e.is_retryable())
    }
}

/// Failures of permission resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resource not found")]
    ResourceNotFound,

    #[error(transparent)]
    Store(#[from] Error),
}

impl ResolveError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Store(e) if e.is_retryable())
    }
}

/// Failures of guarded mutations. None of these are transient except `Store`
/// wrapping `StoreUnavailable`.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("group limit exceeded: user owns {owned} of {limit} groups")]
    GroupLimitExceeded { owned: i64, limit: i64 },

    #[error("no free seats left in group")]
    SeatLimitExceeded,

    #[error("insufficient role in group")]
    InsufficientRole,

    #[error("insufficient permission on resource")]
    InsufficientPermission,

    #[error("restricted tokens cannot perform mutations")]
    RestrictedToken,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("group parent would form a cycle")]
    CyclicParent,

    #[error("user must belong to the parent group first")]
    ParentMembershipRequired,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Store(#[from] Error),
}

impl MutationError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, MutationError::Store(e) if e.is_retryable())
    }
}

impl From<ResolveError> for MutationError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::ResourceNotFound => MutationError::NotFound("resource"),
            ResolveError::Store(e) => MutationError::Store(e),
        }
    }
}

/// Failures of account and token management flows.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("token not found")]
    TokenNotFound,

    #[error("restricted tokens cannot manage the account")]
    RestrictedToken,

    #[error("token belongs to another user")]
    NotTokenOwner,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Store(#[from] Error),
}

impl AccountError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, AccountError::Store(e) if e.is_retryable())
    }
}
