/// Authentication and user management endpoints
///
/// # Endpoints
///
/// - `POST /auth/login` - Exchange username and password for a token (public)
/// - `POST /auth/register` - Create an account (admin or developer)
/// - `POST /auth/setup-password` - Choose the first password (authenticated)
/// - `GET /auth/me` - Current user (authenticated)
/// - `GET /auth/users` - All users (admin)
/// - `PUT /auth/users/:id` - Partial update (admin)
/// - `DELETE /auth/users/:id` - Hard delete (admin)
///
/// Registered accounts have no password. Their first login accepts any
/// password, after which the user must call setup-password.

use crate::{
    app::AppState,
    error::{validate_request, ApiResult},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use ecometer_shared::{
    auth::guard::Principal,
    models::user::{Role, User},
    services::credentials::{LoginOutcome, Registration, UserPatch},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username must not be empty"))]
    pub username: String,

    /// May be omitted while the account still needs its first password
    #[serde(default)]
    pub password: Option<String>,
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Password setup request
#[derive(Debug, Deserialize, Validate)]
pub struct SetupPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// Partial user update; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    /// Renaming signs the user out; tokens name the old username and are
    /// never honored for an account created after them
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: Option<String>,

    pub role: Option<Role>,

    pub is_active: Option<bool>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Login and get an access token
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "token_type": "bearer",
///   "user": { "id": "uuid", "username": "admin", "role": "admin", ... }
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown user, inactive account or wrong password
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginOutcome>> {
    validate_request(&req)?;

    let outcome = state
        .credentials
        .login(&req.username, req.password.as_deref().unwrap_or(""))
        .await?;

    Ok(Json(outcome))
}

/// Register a new account
///
/// # Errors
///
/// - `403 Forbidden`: Caller is a viewer
/// - `409 Conflict`: Username or email already registered
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    validate_request(&req)?;

    let user = state
        .credentials
        .register(
            &principal,
            Registration {
                username: req.username,
                email: req.email,
                full_name: req.full_name,
                role: req.role,
                is_active: req.is_active,
            },
        )
        .await?;

    Ok(Json(user))
}

/// Set the first password
///
/// # Errors
///
/// - `400 Bad Request`: Password already set up
pub async fn setup_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<SetupPasswordRequest>,
) -> ApiResult<Json<User>> {
    validate_request(&req)?;

    let user = state
        .credentials
        .setup_password(&principal, &req.new_password)
        .await?;

    Ok(Json(user))
}

pub async fn me(Extension(principal): Extension<Principal>) -> Json<User> {
    Json(principal.user)
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.credentials.list_users(&principal).await?;
    Ok(Json(users))
}

/// Update any subset of a user's fields
///
/// Setting `password` stores its hash and completes first-login setup.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: No such user
/// - `409 Conflict`: New username or email already registered
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    validate_request(&req)?;

    let user = state
        .credentials
        .update_user(
            &principal,
            id,
            UserPatch {
                username: req.username,
                email: req.email,
                full_name: req.full_name,
                role: req.role,
                is_active: req.is_active,
                password: req.password,
            },
        )
        .await?;

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.credentials.delete_user(&principal, id).await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
