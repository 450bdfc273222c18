//! In-app notifications addressed to a single profile.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{blank_to_none, now};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[sqlx(rename = "profile_id")]
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: String,
}

/// Content of a notification, independent of its recipient
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

/// Admin request; without `userId` the notification is broadcast to every profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub user_id: Option<i64>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

impl Notification {
    /// A profile's notifications, newest first
    pub async fn list_for(
        pool: &SqlitePool,
        profile_id: i64,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM notifications WHERE profile_id = ");
        qb.push_bind(profile_id);
        if query.unread_only {
            qb.push(" AND read = 0");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            qb.push(" LIMIT ").push_bind(limit);
        }
        qb.build_query_as::<Notification>().fetch_all(pool).await
    }

    pub async fn unread_count(pool: &SqlitePool, profile_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE profile_id = ? AND read = 0")
            .bind(profile_id)
            .fetch_one(pool)
            .await
    }

    /// Fetch a notification only if it belongs to `profile_id`
    pub async fn find_owned(
        pool: &SqlitePool,
        id: i64,
        profile_id: i64,
    ) -> Result<Option<Notification>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM notifications WHERE id = ? AND profile_id = ?")
            .bind(id)
            .bind(profile_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        profile_id: i64,
        new: &NewNotification,
    ) -> Result<Notification, sqlx::Error> {
        let id = sqlx::query(
            "INSERT INTO notifications (profile_id, title, message, kind, read, link, created_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(profile_id)
        .bind(new.title.trim())
        .bind(new.message.trim())
        .bind(new.kind.to_string())
        .bind(blank_to_none(new.link.as_deref()))
        .bind(now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Insert one copy per profile; returns how many were created
    pub async fn broadcast(pool: &SqlitePool, new: &NewNotification) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (profile_id, title, message, kind, read, link, created_at)
            SELECT id, ?, ?, ?, 0, ?, ? FROM profiles
            "#,
        )
        .bind(new.title.trim())
        .bind(new.message.trim())
        .bind(new.kind.to_string())
        .bind(blank_to_none(new.link.as_deref()))
        .bind(now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_read(pool: &SqlitePool, id: i64, profile_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND profile_id = ?")
            .bind(id)
            .bind(profile_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(pool: &SqlitePool, profile_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE profile_id = ? AND read = 0")
            .bind(profile_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: i64, profile_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND profile_id = ?")
            .bind(id)
            .bind(profile_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
