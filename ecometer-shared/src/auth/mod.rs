/// Authentication and authorization utilities
///
/// This module provides the authentication primitives for Ecometer:
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: JWT token issuance and verification
/// - [`guard`]: Bearer token to active principal
/// - [`authorization`]: Role allow-lists with admin override
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HMAC signing with configurable algorithm and expiration
/// - **Revocation**: Deactivating a user invalidates their live tokens
///
/// # Example
///
/// ```
/// use ecometer_shared::auth::password::{hash_password, verify_password};
/// use ecometer_shared::auth::jwt::TokenIssuer;
/// use jsonwebtoken::Algorithm;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash));
///
/// let issuer = TokenIssuer::new(
///     "secret-key-that-is-at-least-32-bytes",
///     Algorithm::HS256,
///     chrono::Duration::minutes(480),
/// );
/// let token = issuer.issue("jdoe")?;
/// assert_eq!(issuer.verify(&token)?.sub, "jdoe");
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod guard;
pub mod jwt;
pub mod password;
