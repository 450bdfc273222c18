//! Financial ledger: revenue and expense transactions and their aggregates.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{blank_to_none, double_option, merge_optional, now, resolve_sort, QueryError, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Revenue,
    Expense,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revenue => write!(f, "revenue"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialTransaction {
    pub id: i64,
    pub kind: String,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub transaction_date: String,
    pub work_order_id: Option<i64>,
    pub payment_method: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    /// Defaults to today
    pub transaction_date: Option<String>,
    pub work_order_id: Option<i64>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionRequest {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub transaction_date: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub work_order_id: Option<Option<i64>>,
    pub payment_method: Option<String>,
}

/// Filters shared by listing, summary and export
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    /// Inclusive `YYYY-MM-DD` bounds on the transaction date
    pub from: Option<String>,
    pub to: Option<String>,
    pub work_order_id: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

pub const TRANSACTION_SORT_FIELDS: &[(&str, &str)] = &[
    ("transactionDate", "transaction_date"),
    ("amount", "amount"),
    ("category", "category"),
    ("createdAt", "created_at"),
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub kind: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &TransactionQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(kind) = query.kind {
        qb.push(" AND kind = ").push_bind(kind.to_string());
    }
    if let Some(category) = blank_to_none(query.category.as_deref()) {
        qb.push(" AND category = ").push_bind(category.to_string());
    }
    if let Some(from) = blank_to_none(query.from.as_deref()) {
        qb.push(" AND transaction_date >= ").push_bind(from.to_string());
    }
    if let Some(to) = blank_to_none(query.to.as_deref()) {
        qb.push(" AND transaction_date <= ").push_bind(to.to_string());
    }
    if let Some(work_order_id) = query.work_order_id {
        qb.push(" AND work_order_id = ").push_bind(work_order_id);
    }
}

impl FinancialTransaction {
    pub async fn list(
        pool: &SqlitePool,
        query: &TransactionQuery,
    ) -> Result<Vec<FinancialTransaction>, QueryError> {
        let column = resolve_sort(query.sort.as_deref(), TRANSACTION_SORT_FIELDS, "transaction_date")?;
        let order = query.order.unwrap_or_default();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM financial_transactions");
        push_filters(&mut qb, query);
        qb.push(format!(" ORDER BY {} {}, id {}", column, order.as_sql(), order.as_sql()));

        Ok(qb.build_query_as::<FinancialTransaction>().fetch_all(pool).await?)
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<FinancialTransaction>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM financial_transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Revenue and expense totals over the filtered transactions
    pub async fn totals(pool: &SqlitePool, query: &TransactionQuery) -> Result<(f64, f64), sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                CAST(COALESCE(SUM(CASE WHEN kind = 'revenue' THEN amount ELSE 0 END), 0) AS REAL),
                CAST(COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount ELSE 0 END), 0) AS REAL)
            FROM financial_transactions
            "#,
        );
        push_filters(&mut qb, query);
        qb.build_query_as::<(f64, f64)>().fetch_one(pool).await
    }

    pub async fn by_category(
        pool: &SqlitePool,
        query: &TransactionQuery,
    ) -> Result<Vec<CategoryTotal>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT category, kind, CAST(SUM(amount) AS REAL) AS total FROM financial_transactions",
        );
        push_filters(&mut qb, query);
        qb.push(" GROUP BY category, kind ORDER BY total DESC, category ASC");
        qb.build_query_as::<CategoryTotal>().fetch_all(pool).await
    }

    /// Per-month totals, oldest month first
    pub async fn monthly(pool: &SqlitePool, query: &TransactionQuery) -> Result<Vec<MonthlyTotal>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                substr(transaction_date, 1, 7) AS month,
                CAST(COALESCE(SUM(CASE WHEN kind = 'revenue' THEN amount ELSE 0 END), 0) AS REAL) AS revenue,
                CAST(COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount ELSE 0 END), 0) AS REAL) AS expenses
            FROM financial_transactions
            "#,
        );
        push_filters(&mut qb, query);
        qb.push(" GROUP BY month ORDER BY month ASC");
        qb.build_query_as::<MonthlyTotal>().fetch_all(pool).await
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateTransactionRequest,
    ) -> Result<FinancialTransaction, sqlx::Error> {
        let ts = now();
        let date = req
            .transaction_date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());

        let id = sqlx::query(
            r#"
            INSERT INTO financial_transactions
                (kind, category, amount, description, transaction_date, work_order_id, payment_method, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.kind.to_string())
        .bind(req.category.trim())
        .bind(req.amount)
        .bind(blank_to_none(req.description.as_deref()))
        .bind(&date)
        .bind(req.work_order_id)
        .bind(blank_to_none(req.payment_method.as_deref()))
        .bind(&ts)
        .bind(&ts)
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM financial_transactions WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateTransactionRequest,
    ) -> Result<Option<FinancialTransaction>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE financial_transactions SET
                kind = ?, category = ?, amount = ?, description = ?, transaction_date = ?,
                work_order_id = ?, payment_method = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.kind.map(|k| k.to_string()).unwrap_or(existing.kind.clone()))
        .bind(req.category.as_deref().map(str::trim).unwrap_or(&existing.category))
        .bind(req.amount.unwrap_or(existing.amount))
        .bind(merge_optional(&req.description, &existing.description))
        .bind(req.transaction_date.as_deref().unwrap_or(&existing.transaction_date))
        .bind(req.work_order_id.unwrap_or(existing.work_order_id))
        .bind(merge_optional(&req.payment_method, &existing.payment_method))
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;

        Self::find(pool, id).await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM financial_transactions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
