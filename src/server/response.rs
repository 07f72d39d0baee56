use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::{AccountError, Error, MutationError, ResolveError};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound => ApiError::not_found("Not found"),
            Error::AlreadyExists => ApiError::new(StatusCode::CONFLICT, "Already exists"),
            Error::BadRequest(msg) => ApiError::bad_request(msg),
            Error::StoreUnavailable(reason) => {
                tracing::error!(reason = %reason, "Store unavailable");
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Store unavailable")
            }
            other => {
                tracing::error!(error = %other, "Store failure");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::ResourceNotFound => ApiError::not_found("Resource not found"),
            ResolveError::Store(e) => e.into(),
        }
    }
}

impl From<MutationError> for ApiError {
    fn from(e: MutationError) -> Self {
        let status = match e {
            MutationError::Store(inner) => return inner.into(),
            MutationError::GroupLimitExceeded { .. } | MutationError::SeatLimitExceeded => {
                StatusCode::PAYMENT_REQUIRED
            }
            MutationError::InsufficientRole
            | MutationError::InsufficientPermission
            | MutationError::RestrictedToken => StatusCode::FORBIDDEN,
            MutationError::NotFound(_) => StatusCode::NOT_FOUND,
            MutationError::AlreadyExists(_) => StatusCode::CONFLICT,
            MutationError::CyclicParent
            | MutationError::ParentMembershipRequired
            | MutationError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        let status = match e {
            AccountError::Store(inner) => return inner.into(),
            AccountError::UserNotFound | AccountError::TokenNotFound => StatusCode::NOT_FOUND,
            AccountError::UserAlreadyExists => StatusCode::CONFLICT,
            AccountError::IncorrectPassword => StatusCode::UNAUTHORIZED,
            AccountError::RestrictedToken | AccountError::NotTokenOwner => StatusCode::FORBIDDEN,
            AccountError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, e.to_string())
    }
}
