//! Dashboard statistics and period-over-period metrics.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{percentage, round2};
use crate::db::{
    format_timestamp, Customer, FinancialTransaction, InventoryItem, QualityCheck, ScheduleItem,
    TeamMember, TransactionQuery, WorkOrder, WorkOrderStatus,
};

/// Length of a metrics comparison window
pub const METRIC_WINDOW_DAYS: i64 = 30;

/// Horizon for the "upcoming schedule" count
pub const UPCOMING_DAYS: i64 = 7;

pub const METRIC_NAMES: [&str; 4] = ["revenue", "expenses", "completedWorkOrders", "newCustomers"];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Count per work-order status; every status is present
    pub work_orders_by_status: BTreeMap<String, i64>,
    pub total_work_orders: i64,
    pub completion_rate: f64,
    pub month_revenue: f64,
    pub month_expenses: f64,
    pub month_net: f64,
    pub low_stock_items: i64,
    pub quality_pass_rate: f64,
    pub upcoming_schedule_items: i64,
    pub total_customers: i64,
    pub active_team_members: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub previous: f64,
    pub change_percent: f64,
}

impl Metric {
    pub fn new(name: &str, value: f64, previous: f64) -> Self {
        Self {
            name: name.to_string(),
            value: round2(value),
            previous: round2(previous),
            change_percent: change_percent(value, previous),
        }
    }
}

/// `(value - previous) / previous * 100`, or 0 when there is no previous value
pub fn change_percent(value: f64, previous: f64) -> f64 {
    percentage(value - previous, previous)
}

/// Look a metric up by name
pub fn find_metric<'a>(metrics: &'a [Metric], name: &str) -> Option<&'a Metric> {
    metrics.iter().find(|m| m.name == name)
}

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next.and_then(|n| n.pred_opt()).unwrap_or(today);
    (start, end)
}

/// Inclusive date window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: NaiveDate,
    end: NaiveDate,
}

impl Window {
    /// The 30 days ending today, and the 30 days before that
    fn current_and_previous(today: NaiveDate) -> (Self, Self) {
        let current = Self {
            start: today - Duration::days(METRIC_WINDOW_DAYS - 1),
            end: today,
        };
        let previous = Self {
            start: current.start - Duration::days(METRIC_WINDOW_DAYS),
            end: current.start - Duration::days(1),
        };
        (current, previous)
    }

    fn transactions(&self) -> TransactionQuery {
        TransactionQuery {
            from: Some(date_string(self.start)),
            to: Some(date_string(self.end)),
            ..Default::default()
        }
    }

    /// Half-open bounds for comparing against RFC 3339 timestamps
    fn timestamp_bounds(&self) -> (String, String) {
        let after_end = self.end + Duration::days(1);
        (date_string(self.start), date_string(after_end))
    }
}

pub async fn dashboard(pool: &SqlitePool, now: DateTime<Utc>) -> Result<DashboardStats, sqlx::Error> {
    let mut by_status: BTreeMap<String, i64> = WorkOrderStatus::ALL
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect();
    for (status, count) in WorkOrder::status_counts(pool).await? {
        *by_status.entry(status).or_default() += count;
    }
    let total: i64 = by_status.values().sum();
    let completed = by_status
        .get(&WorkOrderStatus::Completed.to_string())
        .copied()
        .unwrap_or(0);

    let (month_start, month_end) = month_bounds(now.date_naive());
    let (revenue, expenses) = FinancialTransaction::totals(
        pool,
        &TransactionQuery {
            from: Some(date_string(month_start)),
            to: Some(date_string(month_end)),
            ..Default::default()
        },
    )
    .await?;

    let upcoming = ScheduleItem::count_starting_between(
        pool,
        &format_timestamp(now),
        &format_timestamp(now + Duration::days(UPCOMING_DAYS)),
    )
    .await?;

    Ok(DashboardStats {
        work_orders_by_status: by_status,
        total_work_orders: total,
        completion_rate: percentage(completed as f64, total as f64),
        month_revenue: round2(revenue),
        month_expenses: round2(expenses),
        month_net: round2(revenue - expenses),
        low_stock_items: InventoryItem::count_low(pool).await?,
        quality_pass_rate: QualityCheck::summary(pool).await?.pass_rate,
        upcoming_schedule_items: upcoming,
        total_customers: Customer::count(pool).await?,
        active_team_members: TeamMember::count_active(pool).await?,
    })
}

/// Compare the last 30 days against the 30 days before
pub async fn metrics(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Metric>, sqlx::Error> {
    let (current, previous) = Window::current_and_previous(now.date_naive());

    let (rev_now, exp_now) = FinancialTransaction::totals(pool, &current.transactions()).await?;
    let (rev_prev, exp_prev) = FinancialTransaction::totals(pool, &previous.transactions()).await?;

    let (cur_from, cur_to) = current.timestamp_bounds();
    let (prev_from, prev_to) = previous.timestamp_bounds();

    let completed_now = WorkOrder::count_completed_between(pool, &cur_from, &cur_to).await?;
    let completed_prev = WorkOrder::count_completed_between(pool, &prev_from, &prev_to).await?;
    let customers_now = Customer::count_created_between(pool, &cur_from, &cur_to).await?;
    let customers_prev = Customer::count_created_between(pool, &prev_from, &prev_to).await?;

    Ok(vec![
        Metric::new(METRIC_NAMES[0], rev_now, rev_prev),
        Metric::new(METRIC_NAMES[1], exp_now, exp_prev),
        Metric::new(METRIC_NAMES[2], completed_now as f64, completed_prev as f64),
        Metric::new(METRIC_NAMES[3], customers_now as f64, customers_prev as f64),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        init_memory, CreateCustomerRequest, CreateTransactionRequest, CreateWorkOrderRequest, Priority,
        TransactionKind,
    };
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    async fn add_tx(pool: &SqlitePool, kind: TransactionKind, amount: f64, date: &str) {
        FinancialTransaction::create(
            pool,
            &CreateTransactionRequest {
                kind,
                category: "general".into(),
                amount,
                description: None,
                transaction_date: Some(date.into()),
                work_order_id: None,
                payment_method: None,
            },
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_change_percent() {
        assert_eq!(change_percent(150.0, 100.0), 50.0);
        assert_eq!(change_percent(50.0, 100.0), -50.0);
        assert_eq!(change_percent(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_windows() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (current, previous) = Window::current_and_previous(today);
        assert_eq!(current.start, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(previous.end, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(previous.start, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(
            current.timestamp_bounds(),
            ("2024-03-02".to_string(), "2024-04-01".to_string())
        );

        let dec = NaiveDate::from_ymd_opt(2023, 12, 15).unwrap();
        assert_eq!(month_bounds(dec).1, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_find_metric() {
        let list = vec![Metric::new("revenue", 10.0, 5.0)];
        assert_eq!(find_metric(&list, "revenue").unwrap().change_percent, 100.0);
        assert!(find_metric(&list, "profit").is_none());
    }

    #[tokio::test]
    async fn test_dashboard_on_empty_database() {
        let pool = init_memory().await.unwrap();
        let stats = dashboard(&pool, fixed_now()).await.unwrap();
        assert_eq!(stats.total_work_orders, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.work_orders_by_status.len(), 4);
        assert_eq!(stats.quality_pass_rate, 0.0);
        assert_eq!(stats.month_net, 0.0);
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let pool = init_memory().await.unwrap();
        for title in ["a", "b", "c", "d"] {
            WorkOrder::create(
                &pool,
                &CreateWorkOrderRequest {
                    title: title.into(),
                    description: None,
                    customer_id: None,
                    assigned_to: None,
                    status: WorkOrderStatus::Pending,
                    priority: Priority::Medium,
                    due_date: None,
                    estimated_cost: None,
                    actual_cost: None,
                },
            )
            .await
            .unwrap();
        }
        WorkOrder::set_status(&pool, 1, WorkOrderStatus::Completed).await.unwrap();

        add_tx(&pool, TransactionKind::Revenue, 300.0, "2024-03-05").await;
        add_tx(&pool, TransactionKind::Expense, 120.0, "2024-03-20").await;
        add_tx(&pool, TransactionKind::Revenue, 999.0, "2024-02-28").await;

        let stats = dashboard(&pool, fixed_now()).await.unwrap();
        assert_eq!(stats.total_work_orders, 4);
        assert_eq!(stats.work_orders_by_status["completed"], 1);
        assert_eq!(stats.work_orders_by_status["pending"], 3);
        assert_eq!(stats.completion_rate, 25.0);
        assert_eq!(stats.month_revenue, 300.0);
        assert_eq!(stats.month_net, 180.0);
    }

    #[tokio::test]
    async fn test_metrics_compare_windows() {
        let pool = init_memory().await.unwrap();
        add_tx(&pool, TransactionKind::Revenue, 150.0, "2024-03-10").await;
        add_tx(&pool, TransactionKind::Revenue, 100.0, "2024-02-10").await;
        add_tx(&pool, TransactionKind::Expense, 40.0, "2024-03-02").await;
        // outside both windows
        add_tx(&pool, TransactionKind::Revenue, 5000.0, "2024-01-01").await;

        // Current window: 2024-03-02..=2024-03-31. Previous: 2024-01-31..=2024-03-01.
        for created_at in [
            "2024-03-15T10:00:00Z",
            "2024-03-31T23:59:59Z",
            "2024-02-01T08:00:00Z",
            "2024-01-30T12:00:00Z",
        ] {
            let customer = Customer::create(
                &pool,
                &CreateCustomerRequest {
                    name: format!("Customer {}", created_at),
                    email: None,
                    phone: None,
                    address: None,
                    company: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
            sqlx::query("UPDATE customers SET created_at = ? WHERE id = ?")
                .bind(created_at)
                .bind(customer.id)
                .execute(&pool)
                .await
                .unwrap();
        }

        for completed_at in [
            "2024-03-02T00:00:00Z",
            "2024-02-20T09:30:00Z",
            "2024-03-01T23:59:59Z",
            "2024-04-01T00:00:00Z",
        ] {
            let order = WorkOrder::create(
                &pool,
                &CreateWorkOrderRequest {
                    title: format!("Job {}", completed_at),
                    description: None,
                    customer_id: None,
                    assigned_to: None,
                    status: WorkOrderStatus::Pending,
                    priority: Priority::Low,
                    due_date: None,
                    estimated_cost: None,
                    actual_cost: None,
                },
            )
            .await
            .unwrap();
            sqlx::query("UPDATE work_orders SET status = 'completed', completed_at = ? WHERE id = ?")
                .bind(completed_at)
                .bind(order.id)
                .execute(&pool)
                .await
                .unwrap();
        }

        let list = metrics(&pool, fixed_now()).await.unwrap();
        assert_eq!(list.len(), 4);

        let revenue = find_metric(&list, "revenue").unwrap();
        assert_eq!(revenue.value, 150.0);
        assert_eq!(revenue.previous, 100.0);
        assert_eq!(revenue.change_percent, 50.0);

        let expenses = find_metric(&list, "expenses").unwrap();
        assert_eq!(expenses.value, 40.0);
        assert_eq!(expenses.change_percent, 0.0);

        let customers = find_metric(&list, "newCustomers").unwrap();
        assert_eq!(customers.value, 2.0);
        assert_eq!(customers.previous, 1.0);
        assert_eq!(customers.change_percent, 100.0);

        let completed = find_metric(&list, "completedWorkOrders").unwrap();
        assert_eq!(completed.value, 1.0);
        assert_eq!(completed.previous, 2.0);
        assert_eq!(completed.change_percent, -50.0);
    }
}
