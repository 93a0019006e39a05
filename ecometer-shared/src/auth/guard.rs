/// Access guard: bearer token to authenticated principal
///
/// Authentication is two steps:
///
/// 1. Verify the token signature, issuer and lifetime ([`TokenIssuer::verify`])
/// 2. Load the subject from the credential store and require `is_active`
///
/// The second step makes deactivation an immediate revocation: a token
/// issued before the account was disabled stops working on the next request
/// even though it has not expired.
///
/// Tokens name their subject by username, so a rename leaves old tokens
/// pointing at a name that may later be registered again. A token issued
/// before the account it resolves to was created is rejected.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::jwt::TokenIssuer;
use crate::models::user::{Role, User};
use crate::store::{StoreError, UserStore};

/// Error type for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No Authorization header
    #[error("Not authenticated")]
    MissingCredentials,

    /// Authorization header is not `Bearer <token>`
    #[error("Invalid authorization header: {0}")]
    InvalidFormat(String),

    /// Token failed verification
    #[error("Could not validate credentials")]
    InvalidToken,

    /// Subject no longer exists or is inactive
    #[error("Could not validate credentials")]
    UnknownPrincipal,

    /// Credential store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Authenticated caller
///
/// Wraps the user record loaded for the token subject. Serializes as the
/// user itself (without the password hash).
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Principal {
    pub user: User,
}

impl Principal {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self { user }
    }
}

/// Verifies bearer tokens against the token issuer and credential store
#[derive(Clone)]
pub struct AccessGuard {
    tokens: TokenIssuer,
    users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AccessGuard {
    pub fn new(tokens: TokenIssuer, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Token issuer shared with the login flow
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Resolves a bearer token to an active principal
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the token does not verify
    /// - `AuthError::UnknownPrincipal` if the subject is missing, inactive or
    ///   newer than the token
    /// - `AuthError::Store` if the lookup itself fails
    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .users
            .find_user_by_username(&claims.sub)
            .await?
            .ok_or(AuthError::UnknownPrincipal)?;

        if !user.is_active {
            debug!(user_id = %user.id, "Rejected token for inactive user");
            return Err(AuthError::UnknownPrincipal);
        }

        if claims.iat < user.created_at.timestamp() {
            debug!(user_id = %user.id, "Rejected token issued before the account existed");
            return Err(AuthError::UnknownPrincipal);
        }

        Ok(Principal::from(user))
    }
}

/// Extracts the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively; the token must be non-empty.
pub fn parse_bearer(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingCredentials)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidFormat("Expected Bearer token".to_string()));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Empty bearer token".to_string()));
    }

    Ok(token)
}
