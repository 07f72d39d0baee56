use uuid::Uuid;

use crate::error::AuthError;
use crate::store::Snapshot;
use crate::types::{Identity, Token};

const BEARER_SCHEME: &str = "bearer";

/// One `"<scheme> <value>"` credential as presented by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential<'a> {
    pub scheme: &'a str,
    pub value: &'a str,
}

impl Credential<'_> {
    #[must_use]
    pub fn is_bearer(&self) -> bool {
        self.scheme.eq_ignore_ascii_case(BEARER_SCHEME)
    }
}

/// Splits a credential into scheme and value. Anything other than exactly
/// two whitespace-separated parts is malformed.
pub fn parse_credential(raw: &str) -> Result<Credential<'_>, AuthError> {
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(value), None) => Ok(Credential { scheme, value }),
        _ => Err(AuthError::MalformedCredential),
    }
}

/// Resolves the presented credentials to a single identity.
///
/// The whole request fails if any credential is malformed. Bearer values
/// that are not token ids simply fail to resolve. Several active tokens are
/// accepted only when they all belong to the same user; the first one
/// presented is returned.
pub fn authenticate<S: AsRef<str>>(
    store: &dyn Snapshot,
    candidates: &[S],
    max_credentials: usize,
) -> Result<Identity, AuthError> {
    if candidates.is_empty() {
        return Err(AuthError::NoCredentials);
    }
    if candidates.len() > max_credentials {
        return Err(AuthError::TooManyCredentials {
            count: candidates.len(),
            max: max_credentials,
        });
    }

    let credentials = candidates
        .iter()
        .map(|raw| parse_credential(raw.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let bearer_values: Vec<&str> = credentials
        .iter()
        .filter(|c| c.is_bearer())
        .map(|c| c.value)
        .collect();
    if bearer_values.is_empty() {
        return Err(AuthError::NoBearerToken);
    }

    let mut token_ids: Vec<Uuid> = Vec::with_capacity(bearer_values.len());
    for value in bearer_values {
        if let Ok(id) = Uuid::parse_str(value) {
            if !token_ids.contains(&id) {
                token_ids.push(id);
            }
        }
    }

    let mut active: Vec<Token> = Vec::new();
    for id in token_ids {
        if let Some(token) = store.get_token(id)? {
            if token.active {
                active.push(token);
            }
        }
    }

    let Some(token) = active.first().cloned() else {
        return Err(AuthError::InvalidToken);
    };
    if active.iter().any(|t| t.user_id != token.user_id) {
        return Err(AuthError::AmbiguousIdentity);
    }

    let user = store
        .get_user(token.user_id)?
        .ok_or(AuthError::InvalidToken)?;

    Ok(Identity { user, token })
}
