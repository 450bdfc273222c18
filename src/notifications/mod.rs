//! Operational alerts delivered as in-app notifications.
//!
//! Alerts go to every admin and manager profile. Delivery is best-effort:
//! the mutation that triggered an alert has already been committed, so a
//! failed insert is logged and dropped.

use anyhow::Result;

use crate::db::{InventoryItem, NewNotification, Notification, NotificationKind, Profile, WorkOrder};
use crate::DbPool;

/// Kind of operational event an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    WorkOrderAssigned,
    WorkOrderCompleted,
    LowStock,
}

impl std::fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkOrderAssigned => write!(f, "work_order_assigned"),
            Self::WorkOrderCompleted => write!(f, "work_order_completed"),
            Self::LowStock => write!(f, "low_stock"),
        }
    }
}

/// Alert payload with event details
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub event: AlertEvent,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl AlertPayload {
    pub fn work_order_assigned(work_order: &WorkOrder) -> Self {
        let assignee = work_order
            .assignee_name
            .as_deref()
            .unwrap_or("a team member");
        Self {
            event: AlertEvent::WorkOrderAssigned,
            title: format!("Work order assigned: {}", work_order.title),
            message: format!("\"{}\" was assigned to {}.", work_order.title, assignee),
            link: Some(format!("/work-orders/{}", work_order.id)),
        }
    }

    pub fn work_order_completed(work_order: &WorkOrder) -> Self {
        Self {
            event: AlertEvent::WorkOrderCompleted,
            title: format!("Work order completed: {}", work_order.title),
            message: format!("\"{}\" was marked as completed.", work_order.title),
            link: Some(format!("/work-orders/{}", work_order.id)),
        }
    }

    pub fn low_stock(item: &InventoryItem) -> Self {
        Self {
            event: AlertEvent::LowStock,
            title: format!("Low stock: {}", item.name),
            message: format!(
                "{} ({}) is down to {} units; the minimum is {}.",
                item.name, item.sku, item.current_stock, item.min_stock
            ),
            link: Some(format!("/inventory/{}", item.id)),
        }
    }

    fn kind(&self) -> NotificationKind {
        match self.event {
            AlertEvent::WorkOrderAssigned => NotificationKind::Info,
            AlertEvent::WorkOrderCompleted => NotificationKind::Success,
            AlertEvent::LowStock => NotificationKind::Warning,
        }
    }

    fn to_notification(&self) -> NewNotification {
        NewNotification {
            title: self.title.clone(),
            message: self.message.clone(),
            kind: self.kind(),
            link: self.link.clone(),
        }
    }
}

/// Sends alerts to the profiles that receive them
pub struct AlertService {
    db: DbPool,
}

impl AlertService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Notify every admin and manager. Returns the number of notifications created.
    pub async fn send(&self, payload: &AlertPayload) -> Result<usize> {
        let recipients = Profile::alert_recipients(&self.db).await?;
        if recipients.is_empty() {
            tracing::debug!(event = %payload.event, "No recipients for alert");
            return Ok(0);
        }

        let notification = payload.to_notification();
        let mut delivered = 0;
        for profile_id in recipients {
            match Notification::create(&self.db, profile_id, &notification).await {
                Ok(_) => delivered += 1,
                Err(e) => tracing::warn!(
                    profile_id,
                    event = %payload.event,
                    error = %e,
                    "Failed to deliver alert"
                ),
            }
        }

        tracing::info!(event = %payload.event, delivered, "Alert sent");
        Ok(delivered)
    }

    /// Send without surfacing failures to the caller
    pub async fn send_best_effort(&self, payload: &AlertPayload) {
        if let Err(e) = self.send(payload).await {
            tracing::warn!(event = %payload.event, error = %e, "Failed to send alert");
        }
    }
}
