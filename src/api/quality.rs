//! Quality control API endpoints: standards, checks and the pass-rate summary.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    CreateQualityCheckRequest, CreateQualityStandardRequest, QualityCheck, QualityCheckQuery,
    QualityStandard, QualitySummary, TeamMember, UpdateQualityCheckRequest,
    UpdateQualityStandardRequest, WorkOrder,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    parse_timestamp_field, validate_optional_text, validate_required, validate_score,
    MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

// -------------------------------------------------------------------------
// Standards
// -------------------------------------------------------------------------

pub async fn list_standards(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<QualityStandard>>, ApiError> {
    Ok(Json(QualityStandard::list(&state.db).await?))
}

pub async fn get_standard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<QualityStandard>, ApiError> {
    let standard = QualityStandard::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quality standard not found"))?;
    Ok(Json(standard))
}

pub async fn create_standard(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateQualityStandardRequest>,
) -> Result<(StatusCode, Json<QualityStandard>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_required(&req.name, "Name", MAX_NAME_LENGTH));
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("category", validate_optional_text(&req.category, "Category", MAX_NAME_LENGTH));
    errors.finish()?;

    let standard = QualityStandard::create(&state.db, &req).await?;
    tracing::info!(standard_id = standard.id, name = %standard.name, "Created quality standard");

    Ok((StatusCode::CREATED, Json(standard)))
}

pub async fn update_standard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateQualityStandardRequest>,
) -> Result<Json<QualityStandard>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_required(name, "Name", MAX_NAME_LENGTH));
    }
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("category", validate_optional_text(&req.category, "Category", MAX_NAME_LENGTH));
    errors.finish()?;

    let standard = QualityStandard::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Quality standard not found"))?;
    tracing::info!(standard_id = id, "Updated quality standard");

    Ok(Json(standard))
}

pub async fn delete_standard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !QualityStandard::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Quality standard not found"));
    }
    tracing::info!(standard_id = id, "Deleted quality standard");
    Ok(StatusCode::NO_CONTENT)
}

// -------------------------------------------------------------------------
// Checks
// -------------------------------------------------------------------------

/// Referenced work order, inspector and standards must all exist
async fn check_references(
    state: &AppState,
    errors: &mut ValidationErrorBuilder,
    work_order_id: Option<i64>,
    inspector_id: Option<i64>,
    standard_ids: Option<&[i64]>,
) -> Result<(), ApiError> {
    if let Some(id) = work_order_id {
        if !WorkOrder::exists(&state.db, id).await? {
            errors.add("workOrderId", format!("Work order {} does not exist", id));
        }
    }
    if let Some(id) = inspector_id {
        if !TeamMember::exists(&state.db, id).await? {
            errors.add("inspectorId", format!("Team member {} does not exist", id));
        }
    }
    if let Some(ids) = standard_ids {
        let missing = QualityStandard::missing_ids(&state.db, ids).await?;
        if !missing.is_empty() {
            let list: Vec<String> = missing.iter().map(i64::to_string).collect();
            errors.add("standardIds", format!("Unknown quality standards: {}", list.join(", ")));
        }
    }
    Ok(())
}

fn normalize_check_date(errors: &mut ValidationErrorBuilder, check_date: &mut Option<String>) {
    if let Some(raw) = check_date.as_deref() {
        match parse_timestamp_field(raw, "Check date") {
            Ok(normalized) => *check_date = Some(normalized),
            Err(e) => {
                errors.add("checkDate", e);
            }
        }
    }
}

pub async fn list_checks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QualityCheckQuery>,
) -> Result<Json<Vec<QualityCheck>>, ApiError> {
    Ok(Json(QualityCheck::list(&state.db, &query).await?))
}

pub async fn get_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<QualityCheck>, ApiError> {
    let check = QualityCheck::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quality check not found"))?;
    Ok(Json(check))
}

pub async fn create_check(
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<CreateQualityCheckRequest>,
) -> Result<(StatusCode, Json<QualityCheck>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("score", validate_score(req.score));
    errors.check("notes", validate_optional_text(&req.notes, "Notes", MAX_TEXT_LENGTH));
    normalize_check_date(&mut errors, &mut req.check_date);
    check_references(
        &state,
        &mut errors,
        req.work_order_id,
        req.inspector_id,
        Some(&req.standard_ids),
    )
    .await?;
    errors.finish()?;

    let check = QualityCheck::create(&state.db, &req).await?;
    tracing::info!(
        check_id = check.id,
        status = %check.status,
        standards = check.standard_ids.len(),
        "Recorded quality check"
    );

    Ok((StatusCode::CREATED, Json(check)))
}

pub async fn update_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(mut req): Json<UpdateQualityCheckRequest>,
) -> Result<Json<QualityCheck>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("score", validate_score(req.score.flatten()));
    errors.check("notes", validate_optional_text(&req.notes, "Notes", MAX_TEXT_LENGTH));
    normalize_check_date(&mut errors, &mut req.check_date);
    check_references(
        &state,
        &mut errors,
        req.work_order_id.flatten(),
        req.inspector_id.flatten(),
        req.standard_ids.as_deref(),
    )
    .await?;
    errors.finish()?;

    let check = QualityCheck::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Quality check not found"))?;
    tracing::info!(check_id = id, status = %check.status, "Updated quality check");

    Ok(Json(check))
}

pub async fn delete_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !QualityCheck::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Quality check not found"));
    }
    tracing::info!(check_id = id, "Deleted quality check");
    Ok(StatusCode::NO_CONTENT)
}

/// Counts per status and the pass rate over decided checks
pub async fn quality_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QualitySummary>, ApiError> {
    Ok(Json(QualityCheck::summary(&state.db).await?))
}
