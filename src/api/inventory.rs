//! Inventory API endpoints.
//!
//! `stockStatus` is derived on every read using the configured medium-stock
//! factor. An item that drops into `low` raises a low-stock alert.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    AdjustStockRequest, CreateInventoryItemRequest, InventoryItem, InventoryQuery,
    InventorySummary, StockAdjustment, MAX_STOCK_LEVEL, StockStatus, UpdateInventoryItemRequest,
};
use crate::notifications::{AlertPayload, AlertService};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_non_negative, validate_optional_text, validate_required, validate_sku,
    validate_stock_delta, validate_stock_level, MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

fn validate_create_request(req: &CreateInventoryItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_required(&req.name, "Name", MAX_NAME_LENGTH));
    errors.check("sku", validate_sku(&req.sku));
    errors.check("category", validate_optional_text(&req.category, "Category", MAX_NAME_LENGTH));
    errors.check("currentStock", validate_stock_level(Some(req.current_stock), "Current stock"));
    errors.check("minStock", validate_stock_level(Some(req.min_stock), "Minimum stock"));
    errors.check("unitPrice", validate_non_negative(Some(req.unit_price), "Unit price"));
    errors.check("supplier", validate_optional_text(&req.supplier, "Supplier", MAX_NAME_LENGTH));
    errors.check("location", validate_optional_text(&req.location, "Location", MAX_NAME_LENGTH));
    errors.finish()
}

fn validate_update_request(req: &UpdateInventoryItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_required(name, "Name", MAX_NAME_LENGTH));
    }
    if let Some(sku) = &req.sku {
        errors.check("sku", validate_sku(sku));
    }
    errors.check("category", validate_optional_text(&req.category, "Category", MAX_NAME_LENGTH));
    errors.check("currentStock", validate_stock_level(req.current_stock, "Current stock"));
    errors.check("minStock", validate_stock_level(req.min_stock, "Minimum stock"));
    errors.check("unitPrice", validate_non_negative(req.unit_price, "Unit price"));
    errors.check("supplier", validate_optional_text(&req.supplier, "Supplier", MAX_NAME_LENGTH));
    errors.check("location", validate_optional_text(&req.location, "Location", MAX_NAME_LENGTH));
    errors.finish()
}

/// Alert when an item enters `low`; staying low does not re-alert
async fn alert_if_entered_low(state: &AppState, previous: StockStatus, item: &InventoryItem) {
    if item.stock_status == StockStatus::Low && previous != StockStatus::Low {
        AlertService::new(state.db.clone())
            .send_best_effort(&AlertPayload::low_stock(item))
            .await;
    }
}

pub async fn list_inventory(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    let items = InventoryItem::list(&state.db, &query, state.medium_stock_factor()).await?;
    Ok(Json(items))
}

pub async fn get_inventory_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<InventoryItem>, ApiError> {
    let item = InventoryItem::find(&state.db, id, state.medium_stock_factor())
        .await?
        .ok_or_else(|| ApiError::not_found("Inventory item not found"))?;
    Ok(Json(item))
}

pub async fn create_inventory_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    validate_create_request(&req)?;

    let item = InventoryItem::create(&state.db, &req, state.medium_stock_factor()).await?;
    tracing::info!(item_id = item.id, sku = %item.sku, stock = item.current_stock, "Created inventory item");

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_inventory_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateInventoryItemRequest>,
) -> Result<Json<InventoryItem>, ApiError> {
    validate_update_request(&req)?;
    let factor = state.medium_stock_factor();

    let existing = InventoryItem::find(&state.db, id, factor)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventory item not found"))?;

    let item = InventoryItem::update(&state.db, id, &req, factor)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventory item not found"))?;
    tracing::info!(item_id = id, "Updated inventory item");

    alert_if_entered_low(&state, existing.stock_status, &item).await;
    Ok(Json(item))
}

/// Add or remove stock. Refuses to take the stock below zero.
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<InventoryItem>, ApiError> {
    if let Err(e) = validate_stock_delta(req.delta) {
        return Err(ApiError::validation_field("delta", e));
    }
    if let Err(e) = validate_optional_text(&req.reason, "Reason", MAX_TEXT_LENGTH) {
        return Err(ApiError::validation_field("reason", e));
    }

    match InventoryItem::adjust_stock(&state.db, id, req.delta, state.medium_stock_factor()).await? {
        StockAdjustment::Adjusted {
            item,
            previous_status,
        } => {
            tracing::info!(
                item_id = id,
                delta = req.delta,
                stock = item.current_stock,
                reason = req.reason.as_deref().unwrap_or(""),
                "Adjusted stock"
            );
            alert_if_entered_low(&state, previous_status, &item).await;
            Ok(Json(item))
        }
        StockAdjustment::Insufficient { current_stock } => Err(ApiError::bad_request(format!(
            "Insufficient stock: {} in stock, cannot remove {}",
            current_stock,
            req.delta.unsigned_abs()
        ))),
        StockAdjustment::ExceedsLimit { current_stock } => Err(ApiError::validation_field(
            "delta",
            format!(
                "Stock cannot exceed {}: {} in stock, cannot add {}",
                MAX_STOCK_LEVEL, current_stock, req.delta
            ),
        )),
        StockAdjustment::NotFound => Err(ApiError::not_found("Inventory item not found")),
    }
}

pub async fn delete_inventory_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !InventoryItem::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Inventory item not found"));
    }
    tracing::info!(item_id = id, "Deleted inventory item");
    Ok(StatusCode::NO_CONTENT)
}

/// Item count, stock value and counts per stock status
pub async fn inventory_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InventorySummary>, ApiError> {
    Ok(Json(InventoryItem::summary(&state.db, state.medium_stock_factor()).await?))
}
