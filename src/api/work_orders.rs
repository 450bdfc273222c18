//! Work orders API endpoints.
//!
//! Assigning a work order or completing it notifies admins and managers.
//! Those alerts are sent after the write and never fail the request.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    CreateWorkOrderRequest, Customer, TeamMember, UpdateWorkOrderRequest,
    UpdateWorkOrderStatusRequest, WorkOrder, WorkOrderQuery, WorkOrderStatus,
};
use crate::notifications::{AlertPayload, AlertService};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_non_negative, validate_optional_date, validate_optional_text, validate_required,
    MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

fn validate_create_request(req: &CreateWorkOrderRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validate_required(&req.title, "Title", MAX_NAME_LENGTH));
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("dueDate", validate_optional_date(&req.due_date, "Due date"));
    errors.check("estimatedCost", validate_non_negative(req.estimated_cost, "Estimated cost"));
    errors.check("actualCost", validate_non_negative(req.actual_cost, "Actual cost"));
    errors.finish()
}

fn validate_update_request(req: &UpdateWorkOrderRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &req.title {
        errors.check("title", validate_required(title, "Title", MAX_NAME_LENGTH));
    }
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("dueDate", validate_optional_date(&req.due_date, "Due date"));
    errors.check("estimatedCost", validate_non_negative(req.estimated_cost.flatten(), "Estimated cost"));
    errors.check("actualCost", validate_non_negative(req.actual_cost.flatten(), "Actual cost"));
    errors.finish()
}

/// Referenced customer and team member must exist
async fn check_references(
    state: &AppState,
    customer_id: Option<i64>,
    assigned_to: Option<i64>,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(id) = customer_id {
        if !Customer::exists(&state.db, id).await? {
            errors.add("customerId", format!("Customer {} does not exist", id));
        }
    }
    if let Some(id) = assigned_to {
        if !TeamMember::exists(&state.db, id).await? {
            errors.add("assignedTo", format!("Team member {} does not exist", id));
        }
    }
    errors.finish()
}

/// Alerts for the transition from `before` to `after`
async fn send_transition_alerts(state: &AppState, before: Option<&WorkOrder>, after: &WorkOrder) {
    let alerts = AlertService::new(state.db.clone());

    let newly_assigned = after.assigned_to.is_some()
        && before.map_or(true, |b| b.assigned_to != after.assigned_to);
    if newly_assigned {
        alerts
            .send_best_effort(&AlertPayload::work_order_assigned(after))
            .await;
    }

    let newly_completed = after.status_enum() == WorkOrderStatus::Completed
        && before.map_or(true, |b| b.status_enum() != WorkOrderStatus::Completed);
    if newly_completed {
        alerts
            .send_best_effort(&AlertPayload::work_order_completed(after))
            .await;
    }
}

/// List work orders
pub async fn list_work_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorkOrderQuery>,
) -> Result<Json<Vec<WorkOrder>>, ApiError> {
    Ok(Json(WorkOrder::list(&state.db, &query).await?))
}

/// Get a work order by ID
pub async fn get_work_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<WorkOrder>, ApiError> {
    let work_order = WorkOrder::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Work order not found"))?;
    Ok(Json(work_order))
}

/// Create a new work order
pub async fn create_work_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWorkOrderRequest>,
) -> Result<(StatusCode, Json<WorkOrder>), ApiError> {
    validate_create_request(&req)?;
    check_references(&state, req.customer_id, req.assigned_to).await?;

    let work_order = WorkOrder::create(&state.db, &req).await?;
    tracing::info!(
        work_order_id = work_order.id,
        status = %work_order.status,
        priority = %work_order.priority,
        "Created work order"
    );

    send_transition_alerts(&state, None, &work_order).await;
    Ok((StatusCode::CREATED, Json(work_order)))
}

/// Update a work order; absent fields are kept
pub async fn update_work_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateWorkOrderRequest>,
) -> Result<Json<WorkOrder>, ApiError> {
    validate_update_request(&req)?;

    let existing = WorkOrder::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Work order not found"))?;
    check_references(&state, req.customer_id.flatten(), req.assigned_to.flatten()).await?;

    let work_order = WorkOrder::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Work order not found"))?;
    tracing::info!(work_order_id = id, "Updated work order");

    send_transition_alerts(&state, Some(&existing), &work_order).await;
    Ok(Json(work_order))
}

/// Move a work order to another status
pub async fn update_work_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateWorkOrderStatusRequest>,
) -> Result<Json<WorkOrder>, ApiError> {
    let existing = WorkOrder::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Work order not found"))?;

    let work_order = WorkOrder::set_status(&state.db, id, req.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Work order not found"))?;
    tracing::info!(
        work_order_id = id,
        from = %existing.status,
        to = %work_order.status,
        "Changed work order status"
    );

    send_transition_alerts(&state, Some(&existing), &work_order).await;
    Ok(Json(work_order))
}

/// Delete a work order
pub async fn delete_work_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !WorkOrder::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Work order not found"));
    }
    tracing::info!(work_order_id = id, "Deleted work order");
    Ok(StatusCode::NO_CONTENT)
}
