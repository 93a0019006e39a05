/// Domain services
///
/// Services hold the business rules and talk to storage only through the
/// [`crate::store`] traits, so the same code runs against PostgreSQL and the
/// in-memory store.
///
/// # Services
///
/// - [`credentials::CredentialService`]: registration, login, first-login password setup, user administration
/// - [`ledger::LedgerService`]: metric ingestion, listings, per-project insights, sample data

use crate::auth::{authorization::AuthzError, jwt::JwtError, password::PasswordError};
use crate::store::StoreError;

pub mod credentials;
pub mod ledger;

pub use credentials::CredentialService;
pub use ledger::LedgerService;

/// Error type for service operations
///
/// Each variant maps onto one HTTP status in the API crate.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Bad credentials or inactive account (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Role not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Unique constraint violated (409)
    #[error("{0}")]
    Conflict(String),

    /// Target does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// Operation not valid in the current state (400)
    #[error("{0}")]
    BadRequest(String),

    /// A field value breaks an invariant (422)
    #[error("{field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Anything else (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => ServiceError::Conflict(conflict_message(&constraint)),
            StoreError::Database(e) => ServiceError::Internal(format!("Database error: {}", e)),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InsufficientRole { .. } => {
                ServiceError::Forbidden("Not enough permissions".to_string())
            }
        }
    }
}

fn conflict_message(constraint: &str) -> String {
    if constraint.contains("username") {
        "Username already registered".to_string()
    } else if constraint.contains("email") {
        "Email already registered".to_string()
    } else {
        format!("Conflicting record: {}", constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages() {
        let err: ServiceError = StoreError::Conflict("users_username_key".to_string()).into();
        assert_eq!(err.to_string(), "Username already registered");

        let err: ServiceError = StoreError::Conflict("users_email_key".to_string()).into();
        assert_eq!(err.to_string(), "Email already registered");

        let err: ServiceError = StoreError::Conflict("projects_name_key".to_string()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
