/// Credential service: accounts, login and first-login password setup
///
/// # Account lifecycle
///
/// 1. An admin or developer registers the account. It has no password hash
///    and `needs_password_setup = true`.
/// 2. While the flag is set, login accepts any password for that username.
/// 3. The user calls setup-password once; the hash is stored and the flag
///    cleared. From then on the exact password is required.
/// 4. Admins may update or hard-delete the account at any time.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::ServiceError;
use crate::auth::{
    authorization::{authorize, ADMINS, USER_MANAGERS},
    guard::Principal,
    jwt::TokenIssuer,
    password::{hash_password, verify_password},
};
use crate::models::user::{CreateUser, Role, UpdateUser, User};
use crate::store::UserStore;

const BAD_CREDENTIALS: &str = "Incorrect username or password";
const ALREADY_SET_UP: &str = "Password already set up";

/// Candidate account submitted through registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: Option<String>,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
}

/// Partial account update; None leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,

    /// New plaintext password, hashed before storage
    pub password: Option<String>,
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

/// Account seeded on first start
struct DefaultAccount {
    username: &'static str,
    password: &'static str,
    full_name: &'static str,
    email: &'static str,
    role: Role,
}

const DEFAULT_ACCOUNTS: [DefaultAccount; 2] = [
    DefaultAccount {
        username: "admin",
        password: "admin123",
        full_name: "System Administrator",
        email: "admin@company.com",
        role: Role::Admin,
    },
    DefaultAccount {
        username: "developer",
        password: "dev123",
        full_name: "AI Developer",
        email: "developer@company.com",
        role: Role::Developer,
    },
];

/// Credential store operations with their access rules
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    tokens: TokenIssuer,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    /// Registers a new account (admin or developer only)
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `actor` is a viewer
    /// - `Conflict` if the username or a non-null email is taken
    pub async fn register(&self, actor: &Principal, candidate: Registration) -> Result<User, ServiceError> {
        authorize(actor, USER_MANAGERS)?;

        if self
            .users
            .find_user_by_username(&candidate.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict("Username already registered".to_string()));
        }

        if let Some(email) = candidate.email.as_deref() {
            if self.users.find_user_by_email(email).await?.is_some() {
                return Err(ServiceError::Conflict("Email already registered".to_string()));
            }
        }

        // The store's unique constraints still decide concurrent duplicates
        let user = self
            .users
            .create_user(CreateUser {
                username: candidate.username,
                email: candidate.email,
                full_name: candidate.full_name,
                password_hash: None,
                role: candidate.role,
                is_active: candidate.is_active,
                needs_password_setup: true,
            })
            .await?;

        info!(
            user_id = %user.id,
            role = %user.role,
            registered_by = %actor.id(),
            "Registered user"
        );

        Ok(user)
    }

    /// Exchanges credentials for a bearer token
    ///
    /// The password is not checked while the account still needs its
    /// first password.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if the user is absent, inactive, or the password is wrong
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

        if !user.needs_password_setup {
            let matches = user
                .password_hash
                .as_deref()
                .map(|hash| verify_password(password, hash))
                .unwrap_or(false);

            if !matches {
                return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
            }
        }

        let access_token = self.tokens.issue(&user.username)?;

        info!(
            user_id = %user.id,
            first_login = user.needs_password_setup,
            "User logged in"
        );

        Ok(LoginOutcome {
            access_token,
            token_type: "bearer",
            user,
        })
    }

    /// Sets the first password and clears the setup flag
    ///
    /// The flag check and the write are one store operation, so concurrent
    /// calls for the same user yield exactly one success.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the password has already been set up
    pub async fn setup_password(&self, principal: &Principal, new_password: &str) -> Result<User, ServiceError> {
        // Reload: the principal may predate a completed setup
        let current = self
            .users
            .find_user(principal.id())
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if !current.needs_password_setup {
            return Err(ServiceError::BadRequest(ALREADY_SET_UP.to_string()));
        }

        let password_hash = hash_password(new_password)?;

        let user = self
            .users
            .complete_password_setup(current.id, password_hash)
            .await?
            .ok_or_else(|| ServiceError::BadRequest(ALREADY_SET_UP.to_string()))?;

        info!(user_id = %user.id, "Password set up");

        Ok(user)
    }

    /// Partially updates an account (admin only)
    ///
    /// Setting a password also completes first-login setup.
    pub async fn update_user(&self, actor: &Principal, id: Uuid, patch: UserPatch) -> Result<User, ServiceError> {
        authorize(actor, ADMINS)?;

        let password_hash = patch.password.as_deref().map(hash_password).transpose()?;
        let needs_password_setup = password_hash.as_ref().map(|_| false);

        let update = UpdateUser {
            username: patch.username,
            email: patch.email,
            full_name: patch.full_name,
            role: patch.role,
            is_active: patch.is_active,
            password_hash,
            needs_password_setup,
        };

        let user = self
            .users
            .update_user(id, update)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        info!(user_id = %user.id, updated_by = %actor.id(), "Updated user");

        Ok(user)
    }

    /// Hard-deletes an account (admin only)
    pub async fn delete_user(&self, actor: &Principal, id: Uuid) -> Result<(), ServiceError> {
        authorize(actor, ADMINS)?;

        if !self.users.delete_user(id).await? {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }

        warn!(user_id = %id, deleted_by = %actor.id(), "Deleted user");

        Ok(())
    }

    /// All accounts, oldest first (admin only)
    pub async fn list_users(&self, actor: &Principal) -> Result<Vec<User>, ServiceError> {
        authorize(actor, ADMINS)?;
        Ok(self.users.list_users().await?)
    }

    /// Creates the default admin and developer accounts on an empty store
    ///
    /// Returns how many accounts were created (0 when any user exists).
    pub async fn seed_defaults(&self) -> Result<usize, ServiceError> {
        let existing = self.users.count_users().await?;
        if existing > 0 {
            info!(existing, "Users already present, skipping seed");
            return Ok(0);
        }

        for account in &DEFAULT_ACCOUNTS {
            let user = self
                .users
                .create_user(CreateUser {
                    username: account.username.to_string(),
                    email: Some(account.email.to_string()),
                    full_name: account.full_name.to_string(),
                    password_hash: Some(hash_password(account.password)?),
                    role: account.role,
                    is_active: true,
                    needs_password_setup: false,
                })
                .await?;

            info!(user_id = %user.id, username = %user.username, role = %user.role, "Seeded user");
        }

        warn!("Default accounts use well-known passwords; change them before exposing the service");

        Ok(DEFAULT_ACCOUNTS.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use jsonwebtoken::Algorithm;

    fn service() -> (CredentialService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenIssuer::new(
            "credential-test-secret-at-least-32-bytes",
            Algorithm::HS256,
            Duration::minutes(480),
        );
        (CredentialService::new(store.clone(), tokens), store)
    }

    async fn actor(store: &MemoryStore, username: &str, role: Role) -> Principal {
        store
            .create_user(CreateUser {
                username: username.to_string(),
                email: None,
                full_name: username.to_string(),
                password_hash: None,
                role,
                is_active: true,
                needs_password_setup: true,
            })
            .await
            .map(Principal::from)
            .unwrap()
    }

    fn candidate(username: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: None,
            full_name: "New User".to_string(),
            role: Role::Viewer,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_register_creates_passwordless_account() {
        let (service, store) = service();
        let admin = actor(&store, "root", Role::Admin).await;

        let user = service.register(&admin, candidate("alice")).await.unwrap();
        assert!(user.password_hash.is_none());
        assert!(user.needs_password_setup);
        assert_eq!(user.role, Role::Viewer);
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let (service, store) = service();
        let dev = actor(&store, "dev", Role::Developer).await;

        service.register(&dev, candidate("alice")).await.unwrap();
        let err = service.register(&dev, candidate("alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let (service, store) = service();
        let dev = actor(&store, "dev", Role::Developer).await;

        let mut first = candidate("alice");
        first.email = Some("shared@example.com".to_string());
        service.register(&dev, first).await.unwrap();

        let mut second = candidate("bob");
        second.email = Some("shared@example.com".to_string());
        let err = service.register(&dev, second).await.unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn test_viewer_cannot_register() {
        let (service, store) = service();
        let viewer = actor(&store, "watcher", Role::Viewer).await;

        let err = service.register(&viewer, candidate("alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_first_login_then_setup_then_exact_password() {
        let (service, store) = service();
        let admin = actor(&store, "root", Role::Admin).await;
        service.register(&admin, candidate("alice")).await.unwrap();

        // Any password works before setup
        let outcome = service.login("alice", "whatever").await.unwrap();
        assert_eq!(outcome.token_type, "bearer");
        assert!(!outcome.access_token.is_empty());
        assert!(outcome.user.needs_password_setup);

        let principal = Principal::from(outcome.user);
        let user = service.setup_password(&principal, "s3cret-pass").await.unwrap();
        assert!(!user.needs_password_setup);
        assert!(user.password_hash.is_some());

        assert!(service.login("alice", "s3cret-pass").await.is_ok());
        assert!(matches!(
            service.login("alice", "whatever").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_setup_password_twice_fails() {
        let (service, store) = service();
        let principal = actor(&store, "alice", Role::Viewer).await;

        service.setup_password(&principal, "first-pass").await.unwrap();
        let err = service
            .setup_password(&principal, "second-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_setup_password_succeeds_once() {
        let (service, store) = service();
        let principal = actor(&store, "racer", Role::Viewer).await;

        let first = tokio::spawn({
            let (service, principal) = (service.clone(), principal.clone());
            async move { service.setup_password(&principal, "first-pass").await }
        });
        let second = tokio::spawn({
            let (service, principal) = (service.clone(), principal.clone());
            async move { service.setup_password(&principal, "second-pass").await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let winners: Vec<&str> = results
            .iter()
            .zip(["first-pass", "second-pass"])
            .filter(|(result, _)| result.is_ok())
            .map(|(_, password)| password)
            .collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ServiceError::BadRequest(_)))));

        // The winning password is the one that sticks
        assert!(service.login("racer", winners[0]).await.is_ok());
        let loser = if winners[0] == "first-pass" { "second-pass" } else { "first-pass" };
        assert!(matches!(
            service.login("racer", loser).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_and_inactive() {
        let (service, store) = service();
        assert!(matches!(
            service.login("ghost", "x").await,
            Err(ServiceError::Unauthorized(_))
        ));

        let user = actor(&store, "sleeper", Role::Viewer).await;
        store
            .update_user(
                user.id(),
                UpdateUser {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.login("sleeper", "x").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_update_and_delete() {
        let (service, store) = service();
        let admin = actor(&store, "root", Role::Admin).await;
        let target = service.register(&admin, candidate("alice")).await.unwrap();

        let updated = service
            .update_user(
                &admin,
                target.id,
                UserPatch {
                    role: Some(Role::Developer),
                    password: Some("chosen-by-admin".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Developer);
        assert_eq!(updated.username, "alice");
        assert!(!updated.needs_password_setup);
        assert!(service.login("alice", "chosen-by-admin").await.is_ok());

        service.delete_user(&admin, target.id).await.unwrap();
        assert!(matches!(
            service.delete_user(&admin, target.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service
                .update_user(&admin, target.id, UserPatch::default())
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_developer_cannot_administer() {
        let (service, store) = service();
        let dev = actor(&store, "dev", Role::Developer).await;

        assert!(matches!(
            service.list_users(&dev).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_user(&dev, dev.id()).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let (service, store) = service();

        assert_eq!(service.seed_defaults().await.unwrap(), 2);
        assert_eq!(service.seed_defaults().await.unwrap(), 0);
        assert_eq!(store.count_users().await.unwrap(), 2);

        let outcome = service.login("admin", "admin123").await.unwrap();
        assert_eq!(outcome.user.role, Role::Admin);
        assert!(!outcome.user.needs_password_setup);

        assert!(matches!(
            service.login("admin", "wrong").await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(service.login("developer", "dev123").await.is_ok());
    }
}
