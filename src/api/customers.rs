//! Customers API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    CreateCustomerRequest, Customer, CustomerQuery, UpdateCustomerRequest, WorkOrder,
    WorkOrderQuery,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_optional_email, validate_optional_phone, validate_optional_text, validate_required,
    MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

fn validate_contact(
    errors: &mut ValidationErrorBuilder,
    email: &Option<String>,
    phone: &Option<String>,
    address: &Option<String>,
    company: &Option<String>,
    notes: &Option<String>,
) {
    errors.check("email", validate_optional_email(email));
    errors.check("phone", validate_optional_phone(phone));
    errors.check("address", validate_optional_text(address, "Address", MAX_TEXT_LENGTH));
    errors.check("company", validate_optional_text(company, "Company", MAX_NAME_LENGTH));
    errors.check("notes", validate_optional_text(notes, "Notes", MAX_TEXT_LENGTH));
}

fn validate_create_request(req: &CreateCustomerRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_required(&req.name, "Name", MAX_NAME_LENGTH));
    validate_contact(&mut errors, &req.email, &req.phone, &req.address, &req.company, &req.notes);
    errors.finish()
}

fn validate_update_request(req: &UpdateCustomerRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_required(name, "Name", MAX_NAME_LENGTH));
    }
    validate_contact(&mut errors, &req.email, &req.phone, &req.address, &req.company, &req.notes);
    errors.finish()
}

/// List customers
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = Customer::list(&state.db, &query).await?;
    Ok(Json(customers))
}

/// Get a customer by ID
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    let customer = Customer::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    Ok(Json(customer))
}

/// Create a new customer
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    validate_create_request(&req)?;

    let customer = Customer::create(&state.db, &req).await?;
    tracing::info!(customer_id = customer.id, name = %customer.name, "Created customer");

    Ok((StatusCode::CREATED, Json(customer)))
}

/// Update a customer
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    validate_update_request(&req)?;

    let customer = Customer::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    tracing::info!(customer_id = id, "Updated customer");

    Ok(Json(customer))
}

/// Delete a customer. Its work orders are kept and unlinked.
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !Customer::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Customer not found"));
    }
    tracing::info!(customer_id = id, "Deleted customer");
    Ok(StatusCode::NO_CONTENT)
}

/// List the work orders placed by a customer
pub async fn get_customer_work_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<WorkOrder>>, ApiError> {
    if !Customer::exists(&state.db, id).await? {
        return Err(ApiError::not_found("Customer not found"));
    }

    let query = WorkOrderQuery {
        customer_id: Some(id),
        ..Default::default()
    };
    Ok(Json(WorkOrder::list(&state.db, &query).await?))
}
