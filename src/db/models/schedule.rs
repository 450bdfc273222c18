//! Calendar appointments, optionally tied to a work order and a team member.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{blank_to_none, double_option, merge_optional, now};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn default_status() -> ScheduleStatus {
    ScheduleStatus::Scheduled
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub work_order_id: Option<i64>,
    pub work_order_title: Option<String>,
    pub team_member_id: Option<i64>,
    pub team_member_name: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_SCHEDULE_ITEMS: &str = r#"
    SELECT si.id, si.title, si.description, si.start_time, si.end_time,
           si.work_order_id, wo.title AS work_order_title,
           si.team_member_id, tm.name AS team_member_name,
           si.location, si.status, si.created_at, si.updated_at
    FROM schedule_items si
    LEFT JOIN work_orders wo ON wo.id = si.work_order_id
    LEFT JOIN team_members tm ON tm.id = si.team_member_id
"#;

/// Times must already be normalized to the storage format
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleItemRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub work_order_id: Option<i64>,
    pub team_member_id: Option<i64>,
    pub location: Option<String>,
    #[serde(default = "default_status")]
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub work_order_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub team_member_id: Option<Option<i64>>,
    pub location: Option<String>,
    pub status: Option<ScheduleStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    /// Only items overlapping `[from, to)`
    pub from: Option<String>,
    pub to: Option<String>,
    pub team_member_id: Option<i64>,
    pub work_order_id: Option<i64>,
    pub status: Option<ScheduleStatus>,
}

impl ScheduleItem {
    /// List items ordered by start time. `from`/`to` must be normalized.
    pub async fn list(pool: &SqlitePool, query: &ScheduleQuery) -> Result<Vec<ScheduleItem>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_SCHEDULE_ITEMS);
        qb.push(" WHERE 1 = 1");
        // Overlap test: an item [start, end) intersects [from, to)
        if let Some(from) = blank_to_none(query.from.as_deref()) {
            qb.push(" AND si.end_time > ").push_bind(from.to_string());
        }
        if let Some(to) = blank_to_none(query.to.as_deref()) {
            qb.push(" AND si.start_time < ").push_bind(to.to_string());
        }
        if let Some(member) = query.team_member_id {
            qb.push(" AND si.team_member_id = ").push_bind(member);
        }
        if let Some(work_order) = query.work_order_id {
            qb.push(" AND si.work_order_id = ").push_bind(work_order);
        }
        if let Some(status) = query.status {
            qb.push(" AND si.status = ").push_bind(status.to_string());
        }
        qb.push(" ORDER BY si.start_time ASC, si.id ASC");

        qb.build_query_as::<ScheduleItem>().fetch_all(pool).await
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<ScheduleItem>, sqlx::Error> {
        sqlx::query_as(&format!("{} WHERE si.id = ?", SELECT_SCHEDULE_ITEMS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count non-cancelled items starting within `[from, to)`
    pub async fn count_starting_between(
        pool: &SqlitePool,
        from: &str,
        to: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM schedule_items WHERE start_time >= ? AND start_time < ? AND status != 'cancelled'",
        )
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateScheduleItemRequest,
    ) -> Result<ScheduleItem, sqlx::Error> {
        let ts = now();
        let id = sqlx::query(
            r#"
            INSERT INTO schedule_items
                (title, description, start_time, end_time, work_order_id, team_member_id,
                 location, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.title.trim())
        .bind(blank_to_none(req.description.as_deref()))
        .bind(&req.start_time)
        .bind(&req.end_time)
        .bind(req.work_order_id)
        .bind(req.team_member_id)
        .bind(blank_to_none(req.location.as_deref()))
        .bind(req.status.to_string())
        .bind(&ts)
        .bind(&ts)
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as(&format!("{} WHERE si.id = ?", SELECT_SCHEDULE_ITEMS))
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateScheduleItemRequest,
    ) -> Result<Option<ScheduleItem>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE schedule_items SET
                title = ?, description = ?, start_time = ?, end_time = ?, work_order_id = ?,
                team_member_id = ?, location = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.title.as_deref().map(str::trim).unwrap_or(&existing.title))
        .bind(merge_optional(&req.description, &existing.description))
        .bind(req.start_time.as_deref().unwrap_or(&existing.start_time))
        .bind(req.end_time.as_deref().unwrap_or(&existing.end_time))
        .bind(req.work_order_id.unwrap_or(existing.work_order_id))
        .bind(req.team_member_id.unwrap_or(existing.team_member_id))
        .bind(merge_optional(&req.location, &existing.location))
        .bind(req.status.map(|s| s.to_string()).unwrap_or(existing.status.clone()))
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;

        Self::find(pool, id).await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM schedule_items WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn item(title: &str, start: &str, end: &str) -> CreateScheduleItemRequest {
        CreateScheduleItemRequest {
            title: title.to_string(),
            description: None,
            start_time: start.to_string(),
            end_time: end.to_string(),
            work_order_id: None,
            team_member_id: None,
            location: Some("Site A".to_string()),
            status: ScheduleStatus::Scheduled,
        }
    }

    #[tokio::test]
    async fn test_range_filter_uses_overlap() {
        let pool = init_memory().await.unwrap();
        ScheduleItem::create(&pool, &item("early", "2024-05-01T08:00:00Z", "2024-05-01T09:00:00Z"))
            .await
            .unwrap();
        ScheduleItem::create(&pool, &item("spanning", "2024-05-01T09:30:00Z", "2024-05-01T12:00:00Z"))
            .await
            .unwrap();
        ScheduleItem::create(&pool, &item("late", "2024-05-02T08:00:00Z", "2024-05-02T09:00:00Z"))
            .await
            .unwrap();

        let items = ScheduleItem::list(
            &pool,
            &ScheduleQuery {
                from: Some("2024-05-01T10:00:00Z".into()),
                to: Some("2024-05-02T00:00:00Z".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["spanning"]);

        let all = ScheduleItem::list(&pool, &ScheduleQuery::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "spanning", "late"]);
    }

    #[tokio::test]
    async fn test_update_can_unlink_member() {
        let pool = init_memory().await.unwrap();
        let member_id = sqlx::query(
            "INSERT INTO team_members (name, position, status, created_at, updated_at) VALUES ('Ana', 'Tech', 'active', '', '')",
        )
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let mut req = item("visit", "2024-05-01T08:00:00Z", "2024-05-01T09:00:00Z");
        req.team_member_id = Some(member_id);
        let created = ScheduleItem::create(&pool, &req).await.unwrap();
        assert_eq!(created.team_member_name.as_deref(), Some("Ana"));

        let updated = ScheduleItem::update(
            &pool,
            created.id,
            &UpdateScheduleItemRequest {
                team_member_id: Some(None),
                status: Some(ScheduleStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.team_member_id, None);
        assert_eq!(updated.status, "completed");
        assert_eq!(updated.location.as_deref(), Some("Site A"));
    }
}
