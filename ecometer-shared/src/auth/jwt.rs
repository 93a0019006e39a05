/// JWT token generation and validation module
///
/// Access tokens are signed with an HMAC algorithm (HS256 by default,
/// HS384 and HS512 also accepted) and carry the username as subject.
///
/// # Security
///
/// - **Algorithm**: HMAC-SHA2, chosen once at startup
/// - **Expiration**: Configurable TTL (default 480 minutes)
/// - **Validation**: Signature, expiration, not-before and issuer checks
/// - **Secret Management**: Secrets should be at least 32 bytes (256 bits)
///
/// Every verification failure is reported as [`JwtError::Invalid`]; the
/// concrete reason is only logged at debug level so callers cannot tell an
/// expired token from a forged one.
///
/// # Example
///
/// ```
/// use ecometer_shared::auth::jwt::TokenIssuer;
/// use jsonwebtoken::Algorithm;
/// use chrono::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new(
///     "your-secret-key-at-least-32-bytes-long",
///     Algorithm::HS256,
///     Duration::minutes(480),
/// );
///
/// let token = issuer.issue("admin")?;
/// let claims = issuer.verify(&token)?;
/// assert_eq!(claims.sub, "admin");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Issuer claim stamped on every token
pub const ISSUER: &str = "ecometer";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token failed verification for any reason
    #[error("Invalid or expired token")]
    Invalid,

    /// Algorithm name is not one of the accepted HMAC algorithms
    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Parses a configured algorithm name
///
/// Only the symmetric HMAC family is accepted; asymmetric algorithms would
/// need key files this service does not manage.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, JwtError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(JwtError::UnsupportedAlgorithm(name.to_string())),
    }
}

/// JWT claims structure
///
/// - `sub`: Subject (username)
/// - `iss`: Issuer (always "ecometer")
/// - `iat`: Issued at timestamp
/// - `nbf`: Not before timestamp
/// - `exp`: Expiration timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - username
    pub sub: String,

    /// Issuer - always "ecometer"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates claims valid from now for `ttl`
    pub fn new(subject: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs and verifies access tokens with one process-wide secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer from the shared secret
    pub fn new(secret: &str, algorithm: Algorithm, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl,
        }
    }

    /// Configured token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `subject` with the configured TTL
    pub fn issue(&self, subject: &str) -> Result<String, JwtError> {
        self.issue_with_ttl(subject, self.ttl)
    }

    /// Issues a token for `subject` with an explicit TTL
    pub fn issue_with_ttl(&self, subject: &str, ttl: Duration) -> Result<String, JwtError> {
        let claims = Claims::new(subject, ttl);

        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies signature, issuer, expiry and not-before
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Invalid` for every kind of failure
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(reason = ?e.kind(), "Rejected bearer token");
                JwtError::Invalid
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Algorithm::HS256, Duration::minutes(480))
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_algorithm("hs384").unwrap(), Algorithm::HS384);
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert!(matches!(
            parse_algorithm("RS256"),
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
        assert!(parse_algorithm("none").is_err());
    }

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new("alice", Duration::hours(1));

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let token = issuer.issue("alice").expect("Should create token");

        let claims = issuer.verify(&token).expect("Should validate token");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 480 * 60);
    }

    #[test]
    fn test_verify_with_wrong_secret() {
        let token = issuer().issue("alice").unwrap();
        let other = TokenIssuer::new(
            "a-completely-different-secret-of-32-bytes",
            Algorithm::HS256,
            Duration::minutes(480),
        );

        assert!(matches!(other.verify(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn test_verify_with_wrong_algorithm() {
        let token = TokenIssuer::new(SECRET, Algorithm::HS512, Duration::minutes(5))
            .issue("alice")
            .unwrap();

        assert!(matches!(issuer().verify(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn test_verify_expired_token() {
        let issuer = issuer();
        // Beyond the default 60s leeway
        let token = issuer
            .issue_with_ttl("alice", Duration::seconds(-3600))
            .unwrap();

        assert!(matches!(issuer.verify(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn test_verify_foreign_issuer() {
        let mut claims = Claims::new("alice", Duration::hours(1));
        claims.iss = "someone-else".to_string();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(issuer().verify(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn test_verify_garbage() {
        assert!(matches!(issuer().verify("not.a.token"), Err(JwtError::Invalid)));
        assert!(matches!(issuer().verify(""), Err(JwtError::Invalid)));
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", issuer());
        assert!(rendered.contains("HS256"));
        assert!(!rendered.contains(SECRET));
    }
}
