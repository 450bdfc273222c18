//! Notifications API endpoints.
//!
//! Every route except `create_notification` acts on the caller's own
//! notifications. Someone else's notification is reported as not found.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{CreateNotificationRequest, NewNotification, Notification, NotificationQuery, Profile};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_optional_text, validate_required, MAX_NAME_LENGTH, MAX_TEXT_LENGTH};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationResponse {
    pub delivered: u64,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(Notification::list_for(&state.db, user.id(), &query).await?))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let count = Notification::unread_count(&state.db, user.id()).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, ApiError> {
    if !Notification::mark_read(&state.db, id, user.id()).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    let notification = Notification::find_owned(&state.db, id, user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = Notification::mark_all_read(&state.db, user.id()).await?;
    tracing::debug!(profile_id = user.id(), updated, "Marked notifications read");
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !Notification::delete(&state.db, id, user.id()).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    tracing::info!(notification_id = id, profile_id = user.id(), "Deleted notification");
    Ok(StatusCode::NO_CONTENT)
}

/// Admin: send a notification to one profile, or to every profile when no
/// `userId` is given
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<CreateNotificationResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validate_required(&req.title, "Title", MAX_NAME_LENGTH));
    errors.check("message", validate_required(&req.message, "Message", MAX_TEXT_LENGTH));
    errors.check("link", validate_optional_text(&req.link, "Link", 2048));
    errors.finish()?;

    let new = NewNotification {
        title: req.title,
        message: req.message,
        kind: req.kind,
        link: req.link,
    };

    let delivered = match req.user_id {
        Some(profile_id) => {
            if Profile::find(&state.db, profile_id).await?.is_none() {
                return Err(ApiError::validation_field(
                    "userId",
                    format!("Profile {} does not exist", profile_id),
                ));
            }
            Notification::create(&state.db, profile_id, &new).await?;
            1
        }
        None => Notification::broadcast(&state.db, &new).await?,
    };
    tracing::info!(
        recipient = ?req.user_id,
        delivered,
        kind = %new.kind,
        "Created notification"
    );

    Ok((StatusCode::CREATED, Json(CreateNotificationResponse { delivered })))
}
