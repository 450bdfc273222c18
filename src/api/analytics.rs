//! Dashboard and metrics endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::reports::{self, DashboardStats, Metric};
use crate::AppState;

use super::error::ApiError;

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(reports::dashboard(&state.db, chrono::Utc::now()).await?))
}

pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    Ok(Json(reports::metrics(&state.db, chrono::Utc::now()).await?))
}

pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Metric>, ApiError> {
    let metrics = reports::metrics(&state.db, chrono::Utc::now()).await?;
    let metric = reports::find_metric(&metrics, &name)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("Unknown metric '{}'", name)))?;
    Ok(Json(metric))
}
