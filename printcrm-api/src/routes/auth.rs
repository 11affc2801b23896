/// Authentication endpoints
///
/// Every sign-in creates a server-side session; the access and refresh
/// tokens handed out are bound to it, so logging out or deleting the
/// account invalidates them immediately.
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `POST /v1/auth/logout` - End the current session
/// - `GET /v1/auth/me` - Current identity
/// - `PATCH /v1/auth/profile` - Update name and business settings
/// - `PUT /v1/auth/password` - Change password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use printcrm_shared::{
    account::export::UserProfile,
    auth::{
        jwt::{self, TokenType},
        password,
    },
    identity::Identity,
    models::{
        session::Session,
        user::{CreateUser, UpdateUser, User, UNUSABLE_PASSWORD_HASH},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked for strength separately
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Tokens for a new session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Profile update; absent fields are left alone
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Business settings and notification preferences, replaced as a whole
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Opens a session for `user` and issues its token pair
async fn open_session(state: &AppState, user: &User) -> ApiResult<SessionResponse> {
    let session = Session::create(&state.db, user.id, TokenType::Refresh.default_expiration()).await?;
    let (access_token, refresh_token) = jwt::issue_token_pair(user.id, session.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, session_id = %session.id, "Session opened");

    Ok(SessionResponse {
        user_id: user.id,
        session_id: session.id,
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: TokenType::Access.default_expiration().num_seconds(),
    })
}

/// Whether `password` matches the stored hash
///
/// Accounts without a usable password never match.
fn password_matches(password: &str, stored_hash: &str) -> ApiResult<bool> {
    if stored_hash == UNUSABLE_PASSWORD_HASH {
        return Ok(false);
    }
    Ok(password::verify_password(password, stored_hash)?)
}

/// Register a new user
///
/// ```text
/// POST /v1/auth/register
///
/// { "email": "owner@signshop.example", "password": "Banner#2024", "name": "Ravi" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: invalid email or weak password
/// - `409 Conflict`: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid_field("password", message))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_lowercase(),
            password_hash,
            name: req.name,
            metadata: serde_json::json!({}),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let response = open_session(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email or wrong password (same message for
///   both)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password_matches(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(open_session(&state, &user).await?))
}

/// Exchanges a refresh token for a new access token
///
/// The session the token belongs to must still be active.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let session = Session::find_active(&state.db, claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(|| ApiError::Unauthorized("Session expired or revoked".to_string()))?;

    let access_token = jwt::create_token(
        &jwt::Claims::new(session.user_id, session.id, TokenType::Access),
        state.jwt_secret(),
    )?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: TokenType::Access.default_expiration().num_seconds(),
    }))
}

/// Ends the session the request was made with
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    state.identity.invalidate_session(&identity).await?;
    tracing::info!(user_id = %identity.user_id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// Current identity, in the same shape as the export's `user_profile`
pub async fn me(Extension(identity): Extension<Identity>) -> Json<UserProfile> {
    Json(UserProfile::from(&identity))
}

/// Updates display name and business settings
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    if let Some(metadata) = &req.metadata {
        if !metadata.is_object() {
            return Err(ApiError::invalid_field("metadata", "Metadata must be an object"));
        }
    }

    let update = UpdateUser {
        name: req.name.map(|n| {
            let n = n.trim().to_string();
            (!n.is_empty()).then_some(n)
        }),
        metadata: req.metadata,
        ..Default::default()
    };

    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let user = User::update(&state.db, identity.user_id, update)
        .await?
        .ok_or_else(ApiError::unauthenticated)?;

    Ok(Json(user))
}

/// Changes the password after checking the current one
///
/// Every session of the user is revoked, including the one making the
/// request; the client signs in again with the new password.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let user = User::find_by_id(&state.db, identity.user_id)
        .await?
        .ok_or_else(ApiError::unauthenticated)?;

    if !password_matches(&req.current_password, &user.password_hash)? {
        return Err(ApiError::invalid_field(
            "current_password",
            "Current password is incorrect",
        ));
    }

    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid_field("new_password", message))?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update(
        &state.db,
        user.id,
        UpdateUser {
            password_hash: Some(password_hash),
            ..Default::default()
        },
    )
    .await?;

    let revoked = Session::revoke_all_for_user(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, revoked_sessions = revoked, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
