use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;
use crate::server::AppState;
use crate::types::Identity;

/// Extractor that runs every `Authorization` header through the token
/// authenticator.
pub struct RequireIdentity(pub Identity);

/// Rejection carrying the authenticator's failure.
#[derive(Debug)]
pub struct AuthRejection(pub AuthError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthError::NoCredentials
            | AuthError::NoBearerToken
            | AuthError::InvalidToken
            | AuthError::AmbiguousIdentity => StatusCode::UNAUTHORIZED,
            AuthError::TooManyCredentials { .. } | AuthError::MalformedCredential => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Store(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self.0 {
            AuthError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"roost\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireIdentity {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let headers = parts.headers.get_all(AUTHORIZATION);
        let count = headers.iter().count();
        let max = state.engine.config().max_credentials;
        if count > max {
            tracing::warn!(presented = count, "Authentication rejected: too many credentials");
            return Err(AuthRejection(AuthError::TooManyCredentials { count, max }));
        }

        let candidates = headers
            .iter()
            .map(|value| {
                value
                    .to_str()
                    .map_err(|_| AuthRejection(AuthError::MalformedCredential))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let identity = state.engine.authenticate(&candidates).map_err(AuthRejection)?;
        Ok(RequireIdentity(identity))
    }
}
