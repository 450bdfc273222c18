//! Finance API endpoints: the transaction ledger, its summary and export.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{
    CreateTransactionRequest, FinancialTransaction, SortOrder, TransactionKind, TransactionQuery,
    UpdateTransactionRequest, WorkOrder,
};
use crate::reports::{
    export_filename, export_transactions, financial_summary, parse_fields, ExportFormat,
    FinancialSummary,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_amount, validate_optional_date, validate_optional_text, validate_required,
    MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

/// Export parameters: format, field list and the usual ledger filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub format: Option<String>,
    /// Comma-separated field names
    pub fields: Option<String>,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub work_order_id: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl ExportQuery {
    fn filters(&self) -> TransactionQuery {
        TransactionQuery {
            kind: self.kind,
            category: self.category.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            work_order_id: self.work_order_id,
            sort: self.sort.clone(),
            order: self.order,
        }
    }
}

fn validate_range(query: &TransactionQuery) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("from", validate_optional_date(&query.from, "From"));
    errors.check("to", validate_optional_date(&query.to, "To"));
    errors.finish()
}

async fn check_work_order(state: &AppState, errors: &mut ValidationErrorBuilder, id: Option<i64>) -> Result<(), ApiError> {
    if let Some(id) = id {
        if !WorkOrder::exists(&state.db, id).await? {
            errors.add("workOrderId", format!("Work order {} does not exist", id));
        }
    }
    Ok(())
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<FinancialTransaction>>, ApiError> {
    validate_range(&query)?;
    Ok(Json(FinancialTransaction::list(&state.db, &query).await?))
}

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<FinancialTransaction>, ApiError> {
    let transaction = FinancialTransaction::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    Ok(Json(transaction))
}

pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<FinancialTransaction>), ApiError> {
    if req.transaction_date.as_deref().is_some_and(|d| d.trim().is_empty()) {
        req.transaction_date = None;
    }

    let mut errors = ValidationErrorBuilder::new();
    errors.check("category", validate_required(&req.category, "Category", MAX_NAME_LENGTH));
    errors.check("amount", validate_amount(req.amount));
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("transactionDate", validate_optional_date(&req.transaction_date, "Transaction date"));
    errors.check("paymentMethod", validate_optional_text(&req.payment_method, "Payment method", MAX_NAME_LENGTH));
    check_work_order(&state, &mut errors, req.work_order_id).await?;
    errors.finish()?;

    let transaction = FinancialTransaction::create(&state.db, &req).await?;
    tracing::info!(
        transaction_id = transaction.id,
        kind = %transaction.kind,
        amount = transaction.amount,
        "Recorded transaction"
    );

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<Json<FinancialTransaction>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(category) = &req.category {
        errors.check("category", validate_required(category, "Category", MAX_NAME_LENGTH));
    }
    if let Some(amount) = req.amount {
        errors.check("amount", validate_amount(amount));
    }
    if let Some(date) = &req.transaction_date {
        if date.trim().is_empty() {
            errors.add("transactionDate", "Transaction date cannot be cleared");
        }
    }
    errors.check("description", validate_optional_text(&req.description, "Description", MAX_TEXT_LENGTH));
    errors.check("transactionDate", validate_optional_date(&req.transaction_date, "Transaction date"));
    errors.check("paymentMethod", validate_optional_text(&req.payment_method, "Payment method", MAX_NAME_LENGTH));
    check_work_order(&state, &mut errors, req.work_order_id.flatten()).await?;
    errors.finish()?;

    let transaction = FinancialTransaction::update(&state.db, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    tracing::info!(transaction_id = id, "Updated transaction");

    Ok(Json(transaction))
}

pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !FinancialTransaction::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Transaction not found"));
    }
    tracing::info!(transaction_id = id, "Deleted transaction");
    Ok(StatusCode::NO_CONTENT)
}

/// Totals, margin, category breakdown and monthly series
pub async fn get_financial_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<FinancialSummary>, ApiError> {
    validate_range(&query)?;
    Ok(Json(financial_summary(&state.db, &query).await?))
}

/// Download the filtered ledger as a CSV or JSON attachment
pub async fn export_finance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = match query.format.as_deref() {
        Some(f) => f.parse()?,
        None => ExportFormat::default(),
    };
    let fields = parse_fields(query.fields.as_deref())?;
    let filters = query.filters();
    validate_range(&filters)?;

    let transactions = FinancialTransaction::list(&state.db, &filters).await?;
    let body = export_transactions(&transactions, format, &fields)?;
    let filename = export_filename(format, chrono::Utc::now().date_naive());
    tracing::info!(rows = transactions.len(), file = %filename, "Exported transactions");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|_| ApiError::internal("Invalid export filename"))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
