//! Work orders: units of service work with a status and priority.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{
    blank_to_none, double_option, like_pattern, merge_optional, LIKE_ESCAPE, now, resolve_sort, QueryError,
    SortOrder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkOrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown work order status: {}", s)),
        }
    }
}

impl From<String> for WorkOrderStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_status() -> WorkOrderStatus {
    WorkOrderStatus::Pending
}

/// Work order row joined with the customer and assignee names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub assigned_to: Option<i64>,
    pub assignee_name: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

const SELECT_WORK_ORDERS: &str = r#"
    SELECT wo.id, wo.title, wo.description,
           wo.customer_id, c.name AS customer_name,
           wo.assigned_to, tm.name AS assignee_name,
           wo.status, wo.priority, wo.due_date, wo.estimated_cost, wo.actual_cost,
           wo.created_at, wo.updated_at, wo.completed_at
    FROM work_orders wo
    LEFT JOIN customers c ON c.id = wo.customer_id
    LEFT JOIN team_members tm ON tm.id = wo.assigned_to
"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkOrderRequest {
    pub title: String,
    pub description: Option<String>,
    pub customer_id: Option<i64>,
    pub assigned_to: Option<i64>,
    #[serde(default = "default_status")]
    pub status: WorkOrderStatus,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub due_date: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkOrderRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `null` unlinks the customer
    #[serde(default, deserialize_with = "double_option")]
    pub customer_id: Option<Option<i64>>,
    /// `null` unassigns the work order
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i64>>,
    pub status: Option<WorkOrderStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    /// `null` clears the estimate
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_cost: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_cost: Option<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWorkOrderStatusRequest {
    pub status: WorkOrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderQuery {
    pub status: Option<WorkOrderStatus>,
    pub priority: Option<Priority>,
    pub customer_id: Option<i64>,
    pub assigned_to: Option<i64>,
    /// Substring match on the title
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

pub const WORK_ORDER_SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "wo.created_at"),
    ("dueDate", "wo.due_date"),
    ("status", "wo.status"),
    ("title", "wo.title"),
    (
        "priority",
        "CASE wo.priority WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END",
    ),
];

/// `completed_at` for a status change: stamped on entering `completed`,
/// kept while staying there, cleared on leaving it.
fn completed_at_for(
    new_status: WorkOrderStatus,
    old_status: WorkOrderStatus,
    old_completed_at: Option<String>,
) -> Option<String> {
    match (new_status, old_status) {
        (WorkOrderStatus::Completed, WorkOrderStatus::Completed) => old_completed_at.or_else(|| Some(now())),
        (WorkOrderStatus::Completed, _) => Some(now()),
        _ => None,
    }
}

impl WorkOrder {
    pub fn status_enum(&self) -> WorkOrderStatus {
        WorkOrderStatus::from(self.status.clone())
    }

    pub async fn list(pool: &SqlitePool, query: &WorkOrderQuery) -> Result<Vec<WorkOrder>, QueryError> {
        let column = resolve_sort(query.sort.as_deref(), WORK_ORDER_SORT_FIELDS, "wo.created_at")?;
        let order = query.order.unwrap_or_default();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_WORK_ORDERS);
        qb.push(" WHERE 1 = 1");
        if let Some(status) = query.status {
            qb.push(" AND wo.status = ").push_bind(status.to_string());
        }
        if let Some(priority) = query.priority {
            qb.push(" AND wo.priority = ").push_bind(priority.to_string());
        }
        if let Some(customer_id) = query.customer_id {
            qb.push(" AND wo.customer_id = ").push_bind(customer_id);
        }
        if let Some(assigned_to) = query.assigned_to {
            qb.push(" AND wo.assigned_to = ").push_bind(assigned_to);
        }
        if let Some(term) = blank_to_none(query.search.as_deref()) {
            qb.push(" AND wo.title LIKE ")
                .push_bind(like_pattern(term))
                .push(LIKE_ESCAPE);
        }
        qb.push(format!(" ORDER BY {} {}, wo.id ASC", column, order.as_sql()));

        Ok(qb.build_query_as::<WorkOrder>().fetch_all(pool).await?)
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<WorkOrder>, sqlx::Error> {
        sqlx::query_as(&format!("{} WHERE wo.id = ?", SELECT_WORK_ORDERS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM work_orders WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    /// Number of work orders per status. Statuses with no rows are omitted.
    pub async fn status_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT status, COUNT(*) FROM work_orders GROUP BY status")
            .fetch_all(pool)
            .await
    }

    /// Work orders completed within `[from, to)`
    pub async fn count_completed_between(
        pool: &SqlitePool,
        from: &str,
        to: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM work_orders WHERE status = 'completed' AND completed_at >= ? AND completed_at < ?",
        )
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateWorkOrderRequest,
    ) -> Result<WorkOrder, sqlx::Error> {
        let ts = now();
        let completed_at = (req.status == WorkOrderStatus::Completed).then(|| ts.clone());

        let id = sqlx::query(
            r#"
            INSERT INTO work_orders
                (title, description, customer_id, assigned_to, status, priority, due_date,
                 estimated_cost, actual_cost, created_at, updated_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.title.trim())
        .bind(blank_to_none(req.description.as_deref()))
        .bind(req.customer_id)
        .bind(req.assigned_to)
        .bind(req.status.to_string())
        .bind(req.priority.to_string())
        .bind(blank_to_none(req.due_date.as_deref()))
        .bind(req.estimated_cost)
        .bind(req.actual_cost)
        .bind(&ts)
        .bind(&ts)
        .bind(completed_at)
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as(&format!("{} WHERE wo.id = ?", SELECT_WORK_ORDERS))
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateWorkOrderRequest,
    ) -> Result<Option<WorkOrder>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        let old_status = existing.status_enum();
        let new_status = req.status.unwrap_or(old_status);
        let completed_at = completed_at_for(new_status, old_status, existing.completed_at.clone());

        sqlx::query(
            r#"
            UPDATE work_orders SET
                title = ?, description = ?, customer_id = ?, assigned_to = ?, status = ?,
                priority = ?, due_date = ?, estimated_cost = ?, actual_cost = ?,
                updated_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.title.as_deref().map(str::trim).unwrap_or(&existing.title))
        .bind(merge_optional(&req.description, &existing.description))
        .bind(req.customer_id.unwrap_or(existing.customer_id))
        .bind(req.assigned_to.unwrap_or(existing.assigned_to))
        .bind(new_status.to_string())
        .bind(req.priority.map(|p| p.to_string()).unwrap_or(existing.priority.clone()))
        .bind(merge_optional(&req.due_date, &existing.due_date))
        .bind(req.estimated_cost.unwrap_or(existing.estimated_cost))
        .bind(req.actual_cost.unwrap_or(existing.actual_cost))
        .bind(now())
        .bind(completed_at)
        .bind(id)
        .execute(pool)
        .await?;

        Self::find(pool, id).await
    }

    pub async fn set_status(
        pool: &SqlitePool,
        id: i64,
        status: WorkOrderStatus,
    ) -> Result<Option<WorkOrder>, sqlx::Error> {
        Self::update(
            pool,
            id,
            &UpdateWorkOrderRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM work_orders WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, CreateCustomerRequest, Customer};

    fn new_order(title: &str, priority: Priority) -> CreateWorkOrderRequest {
        CreateWorkOrderRequest {
            title: title.to_string(),
            description: None,
            customer_id: None,
            assigned_to: None,
            status: WorkOrderStatus::Pending,
            priority,
            due_date: None,
            estimated_cost: Some(120.0),
            actual_cost: None,
        }
    }

    #[test]
    fn test_status_wire_format() {
        let s: WorkOrderStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(s, WorkOrderStatus::InProgress);
        assert_eq!(s.to_string(), "in-progress");
        assert!(s.is_open());
        assert!(!WorkOrderStatus::Cancelled.is_open());
    }

    #[test]
    fn test_completed_at_transitions() {
        let stamped = completed_at_for(WorkOrderStatus::Completed, WorkOrderStatus::Pending, None);
        assert!(stamped.is_some());

        let kept = completed_at_for(
            WorkOrderStatus::Completed,
            WorkOrderStatus::Completed,
            Some("2024-01-01T00:00:00Z".into()),
        );
        assert_eq!(kept.as_deref(), Some("2024-01-01T00:00:00Z"));

        let cleared = completed_at_for(
            WorkOrderStatus::InProgress,
            WorkOrderStatus::Completed,
            Some("2024-01-01T00:00:00Z".into()),
        );
        assert!(cleared.is_none());
    }

    #[tokio::test]
    async fn test_update_clears_costs_with_null() {
        let pool = init_memory().await.unwrap();
        let mut req = new_order("Pump", Priority::Low);
        req.actual_cost = Some(80.0);
        let order = WorkOrder::create(&pool, &req).await.unwrap();

        let keep: UpdateWorkOrderRequest =
            serde_json::from_value(serde_json::json!({ "title": "Pump service" })).unwrap();
        let kept = WorkOrder::update(&pool, order.id, &keep).await.unwrap().unwrap();
        assert_eq!(kept.estimated_cost, Some(120.0));
        assert_eq!(kept.actual_cost, Some(80.0));

        let clear: UpdateWorkOrderRequest =
            serde_json::from_value(serde_json::json!({ "estimatedCost": null, "actualCost": 95.5 }))
                .unwrap();
        let cleared = WorkOrder::update(&pool, order.id, &clear).await.unwrap().unwrap();
        assert_eq!(cleared.estimated_cost, None);
        assert_eq!(cleared.actual_cost, Some(95.5));
    }

    #[tokio::test]
    async fn test_status_change_stamps_completion() {
        let pool = init_memory().await.unwrap();
        let wo = WorkOrder::create(&pool, &new_order("Fix boiler", Priority::High))
            .await
            .unwrap();
        assert!(wo.completed_at.is_none());

        let done = WorkOrder::set_status(&pool, wo.id, WorkOrderStatus::Completed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, "completed");
        assert!(done.completed_at.is_some());

        let reopened = WorkOrder::set_status(&pool, wo.id, WorkOrderStatus::InProgress)
            .await
            .unwrap()
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_list_sorts_by_priority_rank() {
        let pool = init_memory().await.unwrap();
        WorkOrder::create(&pool, &new_order("a", Priority::Low)).await.unwrap();
        WorkOrder::create(&pool, &new_order("b", Priority::Urgent)).await.unwrap();
        WorkOrder::create(&pool, &new_order("c", Priority::Medium)).await.unwrap();

        let orders = WorkOrder::list(
            &pool,
            &WorkOrderQuery {
                sort: Some("priority".into()),
                order: Some(SortOrder::Desc),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let titles: Vec<_> = orders.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_customer_join_and_delete_clears_link() {
        let pool = init_memory().await.unwrap();
        let customer = Customer::create(
            &pool,
            &CreateCustomerRequest {
                name: "Acme".into(),
                email: None,
                phone: None,
                address: None,
                company: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        let mut req = new_order("Install", Priority::Low);
        req.customer_id = Some(customer.id);
        let wo = WorkOrder::create(&pool, &req).await.unwrap();
        assert_eq!(wo.customer_name.as_deref(), Some("Acme"));

        let filtered = WorkOrder::list(
            &pool,
            &WorkOrderQuery {
                customer_id: Some(customer.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(filtered.len(), 1);

        Customer::delete(&pool, customer.id).await.unwrap();
        let orphan = WorkOrder::find(&pool, wo.id).await.unwrap().unwrap();
        assert_eq!(orphan.customer_id, None);
    }
}
