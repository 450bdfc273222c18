//! Schedule API endpoints.
//!
//! Start and end times are accepted as RFC 3339 (or a bare date) and stored
//! normalized to UTC, so range filters compare them as plain strings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    CreateScheduleItemRequest, ScheduleItem, ScheduleQuery, TeamMember,
    UpdateScheduleItemRequest, WorkOrder,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    parse_timestamp_field, validate_optional_text, validate_required, validate_time_range,
    MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

async fn check_references(
    state: &AppState,
    errors: &mut ValidationErrorBuilder,
    work_order_id: Option<i64>,
    team_member_id: Option<i64>,
) -> Result<(), ApiError> {
    if let Some(id) = work_order_id {
        if !WorkOrder::exists(&state.db, id).await? {
            errors.add("workOrderId", format!("Work order {} does not exist", id));
        }
    }
    if let Some(id) = team_member_id {
        if !TeamMember::exists(&state.db, id).await? {
            errors.add("teamMemberId", format!("Team member {} does not exist", id));
        }
    }
    Ok(())
}

/// Normalize a time field in place, recording a field error on failure
fn normalize_field(errors: &mut ValidationErrorBuilder, field: &str, label: &str, value: &mut String) -> bool {
    match parse_timestamp_field(value, label) {
        Ok(normalized) => {
            *value = normalized;
            true
        }
        Err(e) => {
            errors.add(field, e);
            false
        }
    }
}

/// Normalize a query bound; invalid bounds are rejected rather than ignored
fn normalize_bound(value: &mut Option<String>, field: &str, label: &str) -> Result<(), ApiError> {
    if let Some(raw) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        let normalized =
            parse_timestamp_field(raw, label).map_err(|e| ApiError::validation_field(field, e))?;
        *value = Some(normalized);
    }
    Ok(())
}

pub async fn list_schedule(
    State(state): State<Arc<AppState>>,
    Query(mut query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduleItem>>, ApiError> {
    normalize_bound(&mut query.from, "from", "From")?;
    normalize_bound(&mut query.to, "to", "To")?;
    Ok(Json(ScheduleItem::list(&state.db, &query).await?))
}

pub async fn get_schedule_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ScheduleItem>, ApiError> {
    let item = ScheduleItem::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Schedule item not found"))?;
    Ok(Json(item))
}

pub async fn create_schedule_item(
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<CreateScheduleItemRequest>,
) -> Result<(StatusCode, Json<ScheduleItem>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validate_required(&req.title, "Title", MAX_NAME_LENGTH));
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("location", validate_optional_text(&req.location, "Location", MAX_NAME_LENGTH));

    let start_ok = normalize_field(&mut errors, "startTime", "Start time", &mut req.start_time);
    let end_ok = normalize_field(&mut errors, "endTime", "End time", &mut req.end_time);
    if start_ok && end_ok {
        errors.check("endTime", validate_time_range(&req.start_time, &req.end_time));
    }
    check_references(&state, &mut errors, req.work_order_id, req.team_member_id).await?;
    errors.finish()?;

    let item = ScheduleItem::create(&state.db, &req).await?;
    tracing::info!(
        schedule_item_id = item.id,
        start = %item.start_time,
        end = %item.end_time,
        "Created schedule item"
    );

    Ok((StatusCode::CREATED, Json(item)))
}

/// Update a schedule item. The time range is checked against the merged
/// values, so moving only one end is still validated.
pub async fn update_schedule_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(mut req): Json<UpdateScheduleItemRequest>,
) -> Result<Json<ScheduleItem>, ApiError> {
    let existing = ScheduleItem::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Schedule item not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &req.title {
        errors.check("title", validate_required(title, "Title", MAX_NAME_LENGTH));
    }
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("location", validate_optional_text(&req.location, "Location", MAX_NAME_LENGTH));

    let mut times_ok = true;
    if let Some(start) = req.start_time.as_mut() {
        times_ok &= normalize_field(&mut errors, "startTime", "Start time", start);
    }
    if let Some(end) = req.end_time.as_mut() {
        times_ok &= normalize_field(&mut errors, "endTime", "End time", end);
    }
    if times_ok {
        let start = req.start_time.as_deref().unwrap_or(&existing.start_time);
        let end = req.end_time.as_deref().unwrap_or(&existing.end_time);
        errors.check("endTime", validate_time_range(start, end));
    }
    check_references(&state, &mut errors, req.work_order_id.flatten(), req.team_member_id.flatten()).await?;
    errors.finish()?;

    let item = ScheduleItem::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Schedule item not found"))?;
    tracing::info!(schedule_item_id = id, "Updated schedule item");

    Ok(Json(item))
}

pub async fn delete_schedule_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !ScheduleItem::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Schedule item not found"));
    }
    tracing::info!(schedule_item_id = id, "Deleted schedule item");
    Ok(StatusCode::NO_CONTENT)
}
