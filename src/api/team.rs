//! Team members API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    CreateTeamMemberRequest, TeamMember, TeamMemberQuery, TeamMemberWorkload,
    UpdateTeamMemberRequest,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_non_negative, validate_optional_date, validate_optional_email,
    validate_optional_phone, validate_optional_text, validate_required, MAX_NAME_LENGTH,
};

fn validate_create_request(req: &CreateTeamMemberRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_required(&req.name, "Name", MAX_NAME_LENGTH));
    errors.check("position", validate_required(&req.position, "Position", MAX_NAME_LENGTH));
    errors.check("email", validate_optional_email(&req.email));
    errors.check("phone", validate_optional_phone(&req.phone));
    errors.check("department", validate_optional_text(&req.department, "Department", MAX_NAME_LENGTH));
    errors.check("hourlyRate", validate_non_negative(req.hourly_rate, "Hourly rate"));
    errors.check("hireDate", validate_optional_date(&req.hire_date, "Hire date"));
    errors.finish()
}

fn validate_update_request(req: &UpdateTeamMemberRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_required(name, "Name", MAX_NAME_LENGTH));
    }
    if let Some(position) = &req.position {
        errors.check("position", validate_required(position, "Position", MAX_NAME_LENGTH));
    }
    errors.check("email", validate_optional_email(&req.email));
    errors.check("phone", validate_optional_phone(&req.phone));
    errors.check("department", validate_optional_text(&req.department, "Department", MAX_NAME_LENGTH));
    errors.check("hourlyRate", validate_non_negative(req.hourly_rate.flatten(), "Hourly rate"));
    errors.check("hireDate", validate_optional_date(&req.hire_date, "Hire date"));
    errors.finish()
}

pub async fn list_team_members(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TeamMemberQuery>,
) -> Result<Json<Vec<TeamMember>>, ApiError> {
    Ok(Json(TeamMember::list(&state.db, &query).await?))
}

pub async fn get_team_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TeamMember>, ApiError> {
    let member = TeamMember::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team member not found"))?;
    Ok(Json(member))
}

pub async fn create_team_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamMemberRequest>,
) -> Result<(StatusCode, Json<TeamMember>), ApiError> {
    validate_create_request(&req)?;

    let member = TeamMember::create(&state.db, &req).await?;
    tracing::info!(team_member_id = member.id, name = %member.name, "Created team member");

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_team_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTeamMemberRequest>,
) -> Result<Json<TeamMember>, ApiError> {
    validate_update_request(&req)?;

    let member = TeamMember::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Team member not found"))?;
    tracing::info!(team_member_id = id, "Updated team member");

    Ok(Json(member))
}

/// Delete a member; their work orders and schedule items are unassigned
pub async fn delete_team_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !TeamMember::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Team member not found"));
    }
    tracing::info!(team_member_id = id, "Deleted team member");
    Ok(StatusCode::NO_CONTENT)
}

/// Open work-order count per member
pub async fn team_workload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TeamMemberWorkload>>, ApiError> {
    Ok(Json(TeamMember::workload(&state.db).await?))
}
