/// Role-based authorization checks
///
/// Ecometer has a flat role model with a single override:
///
/// 1. **Admin** passes every check
/// 2. Everyone else must hold one of the roles a route allows
///
/// # Example
///
/// ```
/// use ecometer_shared::auth::authorization::{authorize, USER_MANAGERS};
/// use ecometer_shared::auth::guard::Principal;
///
/// fn can_register(principal: &Principal) -> bool {
///     authorize(principal, USER_MANAGERS).is_ok()
/// }
/// ```

use super::guard::Principal;
use crate::models::user::Role;

/// Roles allowed to register users and generate sample data
pub const USER_MANAGERS: &[Role] = &[Role::Admin, Role::Developer];

/// Roles allowed to administer accounts
pub const ADMINS: &[Role] = &[Role::Admin];

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Principal's role is not in the allow-list
    #[error("Insufficient permissions: role {actual} is not one of {required:?}")]
    InsufficientRole {
        required: Vec<Role>,
        actual: Role,
    },
}

/// Requires the principal to hold one of `allowed`
///
/// Admin always passes, even when absent from `allowed`.
///
/// # Errors
///
/// Returns `AuthzError::InsufficientRole` otherwise
pub fn authorize<'a>(principal: &'a Principal, allowed: &[Role]) -> Result<&'a Principal, AuthzError> {
    let role = principal.role();

    if role.is_admin() || allowed.contains(&role) {
        return Ok(principal);
    }

    Err(AuthzError::InsufficientRole {
        required: allowed.to_vec(),
        actual: role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use chrono::Utc;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal::from(User {
            id: Uuid::new_v4(),
            username: role.as_str().to_string(),
            email: None,
            full_name: "Test".to_string(),
            password_hash: None,
            role,
            is_active: true,
            needs_password_setup: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_admin_bypasses_allow_list() {
        let admin = principal(Role::Admin);
        assert!(authorize(&admin, &[Role::Developer]).is_ok());
        assert!(authorize(&admin, &[]).is_ok());
    }

    #[test]
    fn test_role_in_allow_list() {
        assert!(authorize(&principal(Role::Developer), USER_MANAGERS).is_ok());
        assert!(authorize(&principal(Role::Viewer), &[Role::Viewer]).is_ok());
    }

    #[test]
    fn test_role_outside_allow_list() {
        let viewer = principal(Role::Viewer);
        let err = authorize(&viewer, USER_MANAGERS).unwrap_err();
        assert!(matches!(err, AuthzError::InsufficientRole { actual: Role::Viewer, .. }));

        assert!(authorize(&principal(Role::Developer), ADMINS).is_err());
    }

    #[test]
    fn test_authz_error_display() {
        let err = authorize(&principal(Role::Viewer), ADMINS).unwrap_err();
        assert!(err.to_string().contains("viewer"));
    }
}
