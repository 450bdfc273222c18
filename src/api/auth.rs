//! Login, sessions and role gating.
//!
//! A request is authenticated by a token taken from, in order, the
//! `Authorization: Bearer` header, the `X-API-Key` header, or the `token`
//! query parameter. The token is either the configured admin token or a
//! session token issued by `login`/`setup`.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, HeaderMap, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_optional_text, validate_required, MAX_NAME_LENGTH};
use crate::crypto::{
    generate_token, hash_password, hash_token, secrets_match, validate_password_strength,
    verify_password, verify_password_against_dummy,
};
use crate::db::{
    now, ChangePasswordRequest, LoginRequest, LoginResponse, Profile, ProfileResponse, Role,
    Session, SetupRequest, UpdateProfileRequest,
};
use crate::AppState;

/// Id reported for the synthetic profile behind the configured admin token
pub const SYSTEM_PROFILE_ID: i64 = 0;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatusResponse {
    pub needs_setup: bool,
}

/// The authenticated caller, placed in request extensions by `auth_middleware`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: Profile,
    /// Hash of the session token; `None` when authenticated by the admin token
    pub session_token_hash: Option<String>,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role_enum()
    }

    /// True for the synthetic admin behind the configured admin token
    pub fn is_system(&self) -> bool {
        self.session_token_hash.is_none()
    }

    fn system() -> Self {
        let ts = now();
        Self {
            profile: Profile {
                id: SYSTEM_PROFILE_ID,
                email: "system@opsdesk.local".to_string(),
                password_hash: String::new(),
                full_name: "System Admin".to_string(),
                role: Role::Admin.to_string(),
                avatar_url: None,
                created_at: ts.clone(),
                updated_at: ts,
            },
            session_token_hash: None,
        }
    }
}

pub(super) fn hash_password_for_api(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })
}

/// Issue a new session for a profile and return the plaintext token
async fn start_session(state: &AppState, profile_id: i64) -> Result<String, ApiError> {
    let token = generate_token();
    let expires_at = crate::db::format_timestamp(
        chrono::Utc::now() + chrono::Duration::hours(state.config.auth.session_ttl_hours),
    );
    Session::create(&state.db, profile_id, &hash_token(&token), &expires_at).await?;
    Ok(token)
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(profile) = Profile::find_by_email(&state.db, &request.email).await? else {
        // Unknown emails pay for one Argon2 verification like known ones
        verify_password_against_dummy(&request.password);
        tracing::warn!(email = %request.email, "Failed login attempt");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(&request.password, &profile.password_hash) {
        tracing::warn!(email = %request.email, "Failed login attempt");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if let Err(e) = Session::delete_expired(&state.db).await {
        tracing::warn!("Failed to purge expired sessions: {}", e);
    }

    let token = start_session(&state, profile.id).await?;
    tracing::info!(profile_id = profile.id, "Profile logged in");

    Ok(Json(LoginResponse {
        token,
        profile: profile.into(),
    }))
}

/// Delete the caller's session. A no-op for the admin token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    if let Some(hash) = &user.session_token_hash {
        Session::delete_by_token_hash(&state.db, hash).await?;
        tracing::info!(profile_id = user.id(), "Profile logged out");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Check if initial setup is needed (no profiles exist)
pub async fn setup_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SetupStatusResponse>, ApiError> {
    let count = Profile::count(&state.db).await?;
    Ok(Json(SetupStatusResponse {
        needs_setup: count == 0,
    }))
}

/// Initial setup endpoint - creates the first admin profile and logs it in
pub async fn setup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if Profile::count(&state.db).await? > 0 {
        return Err(ApiError::forbidden("Setup has already been completed"));
    }

    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&request.email));
    errors.check("fullName", validate_required(&request.full_name, "Full name", MAX_NAME_LENGTH));
    if let Some(problem) = validate_password_strength(&request.password) {
        errors.add("password", problem);
    }
    errors.finish()?;

    let password_hash = hash_password_for_api(&request.password)?;
    let profile = Profile::create(
        &state.db,
        &request.email,
        &password_hash,
        &request.full_name,
        Role::Admin,
    )
    .await?;
    tracing::info!(profile_id = profile.id, email = %profile.email, "Created admin profile during setup");

    let token = start_session(&state, profile.id).await?;
    Ok(Json(LoginResponse {
        token,
        profile: profile.into(),
    }))
}

/// Current profile (session hydration)
pub async fn me(user: CurrentUser) -> Json<ProfileResponse> {
    Json(user.profile.into())
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if user.is_system() {
        return Err(ApiError::bad_request("The system admin has no editable profile"));
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &request.full_name {
        errors.check("fullName", validate_required(name, "Full name", MAX_NAME_LENGTH));
    }
    errors.check("avatarUrl", validate_optional_text(&request.avatar_url, "Avatar URL", 2048));
    errors.finish()?;

    let profile = Profile::update_details(&state.db, user.id(), &request)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    tracing::info!(profile_id = profile.id, "Profile updated");
    Ok(Json(profile.into()))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if user.is_system() {
        return Err(ApiError::bad_request("The system admin has no password"));
    }

    if !verify_password(&request.current_password, &user.profile.password_hash) {
        return Err(ApiError::validation_field(
            "currentPassword",
            "Current password is incorrect",
        ));
    }
    if let Some(problem) = validate_password_strength(&request.new_password) {
        return Err(ApiError::validation_field("newPassword", problem));
    }

    let password_hash = hash_password_for_api(&request.new_password)?;
    Profile::set_password(&state.db, user.id(), &password_hash).await?;
    tracing::info!(profile_id = user.id(), "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Extract the token from headers, then the percent-decoded `token` query parameter
fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    if let Some(api_key) = headers.get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Some(api_key.trim().to_string());
    }

    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|token| !token.is_empty())
}

/// Resolve a token to the caller it authenticates
pub async fn resolve_token(state: &AppState, token: &str) -> Result<Option<CurrentUser>, ApiError> {
    if secrets_match(&state.config.auth.admin_token, token) {
        return Ok(Some(CurrentUser::system()));
    }

    let token_hash = hash_token(token);
    let Some(session) = Session::find_active(&state.db, &token_hash).await? else {
        return Ok(None);
    };

    Ok(Profile::find(&state.db, session.profile_id)
        .await?
        .map(|profile| CurrentUser {
            profile,
            session_token_hash: Some(token_hash),
        }))
}

/// Auth middleware that validates tokens and records the caller
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers(), request.uri())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = resolve_token(&state, &token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Gate for admin-only routes. Must run after `auth_middleware`.
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.role().is_admin())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !is_admin {
        return Err(ApiError::forbidden("Admin role required"));
    }
    Ok(next.run(request).await)
}

/// Extractor for the authenticated caller
#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
