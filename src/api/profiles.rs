//! Admin-only profile management.
//!
//! An admin may not demote or delete their own profile, so at least one
//! admin always remains able to reach these routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::crypto::validate_password_strength;
use crate::db::{CreateProfileRequest, Profile, ProfileResponse, Role, UpdateRoleRequest};
use crate::AppState;

use super::auth::{hash_password_for_api, CurrentUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_required, MAX_NAME_LENGTH};

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProfileResponse>>, ApiError> {
    let profiles = Profile::list(&state.db).await?;
    Ok(Json(profiles.into_iter().map(Into::into).collect()))
}

pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Json(req): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&req.email));
    errors.check("fullName", validate_required(&req.full_name, "Full name", MAX_NAME_LENGTH));
    if let Some(problem) = validate_password_strength(&req.password) {
        errors.add("password", problem);
    }
    errors.finish()?;

    if Profile::find_by_email(&state.db, req.email.trim()).await?.is_some() {
        return Err(ApiError::conflict("A profile with this email already exists"));
    }

    let password_hash = hash_password_for_api(&req.password)?;
    let profile = Profile::create(&state.db, &req.email, &password_hash, &req.full_name, req.role).await?;
    tracing::info!(
        profile_id = profile.id,
        role = %profile.role,
        created_by = admin.id(),
        "Created profile"
    );

    Ok((StatusCode::CREATED, Json(profile.into())))
}

pub async fn update_profile_role(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if id == admin.id() && req.role != Role::Admin {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }

    let profile = Profile::set_role(&state.db, id, req.role)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    tracing::info!(profile_id = id, role = %req.role, changed_by = admin.id(), "Changed profile role");

    Ok(Json(profile.into()))
}

/// Delete a profile along with its sessions and notifications
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if id == admin.id() {
        return Err(ApiError::bad_request("You cannot delete your own profile"));
    }

    if !Profile::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Profile not found"));
    }
    tracing::info!(profile_id = id, deleted_by = admin.id(), "Deleted profile");
    Ok(StatusCode::NO_CONTENT)
}
