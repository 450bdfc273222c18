//! Inventory items and their derived stock status.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::reports::round2;

use super::common::{
    blank_to_none, like_pattern, merge_optional, LIKE_ESCAPE, now, resolve_sort, QueryError, SortOrder,
};

/// Stock level relative to the item's minimum. Never stored; derived on read
/// with the configured medium factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Low,
    Medium,
    Good,
}

impl StockStatus {
    pub fn classify(current_stock: i64, min_stock: i64, medium_factor: f64) -> Self {
        if current_stock <= min_stock {
            Self::Low
        } else if (current_stock as f64) <= min_stock as f64 * medium_factor {
            Self::Medium
        } else {
            Self::Good
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::Good => write!(f, "good"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct InventoryRow {
    id: i64,
    name: String,
    sku: String,
    category: Option<String>,
    current_stock: i64,
    min_stock: i64,
    unit_price: f64,
    supplier: Option<String>,
    location: Option<String>,
    created_at: String,
    updated_at: String,
}

impl InventoryRow {
    fn into_item(self, medium_factor: f64) -> InventoryItem {
        InventoryItem {
            stock_status: StockStatus::classify(self.current_stock, self.min_stock, medium_factor),
            id: self.id,
            name: self.name,
            sku: self.sku,
            category: self.category,
            current_stock: self.current_stock,
            min_stock: self.min_stock,
            unit_price: self.unit_price,
            supplier: self.supplier,
            location: self.location,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub current_stock: i64,
    pub min_stock: i64,
    pub unit_price: f64,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub stock_status: StockStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventoryItemRequest {
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    #[serde(default)]
    pub current_stock: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub unit_price: f64,
    pub supplier: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryItemRequest {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub current_stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub unit_price: Option<f64>,
    pub supplier: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub delta: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuery {
    pub category: Option<String>,
    pub stock_status: Option<StockStatus>,
    /// Substring match on name or SKU
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

/// Upper bound for stock levels, well inside SQLite's integer range
pub const MAX_STOCK_LEVEL: i64 = 1_000_000_000;

pub const INVENTORY_SORT_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("sku", "sku"),
    ("category", "category"),
    ("currentStock", "current_stock"),
    ("unitPrice", "unit_price"),
    ("createdAt", "created_at"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_items: i64,
    pub total_value: f64,
    pub low_stock: i64,
    pub medium_stock: i64,
    pub good_stock: i64,
}

/// Result of a stock adjustment
#[derive(Debug, Clone)]
pub enum StockAdjustment {
    Adjusted {
        item: InventoryItem,
        previous_status: StockStatus,
    },
    /// The delta would take the stock below zero; nothing was written
    Insufficient { current_stock: i64 },
    /// The delta would take the stock above `MAX_STOCK_LEVEL`; nothing was written
    ExceedsLimit { current_stock: i64 },
    NotFound,
}

impl InventoryItem {
    pub async fn list(
        pool: &SqlitePool,
        query: &InventoryQuery,
        medium_factor: f64,
    ) -> Result<Vec<InventoryItem>, QueryError> {
        let column = resolve_sort(query.sort.as_deref(), INVENTORY_SORT_FIELDS, "name")?;
        let order = query.order.unwrap_or(SortOrder::Asc);

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM inventory_items WHERE 1 = 1");
        if let Some(category) = blank_to_none(query.category.as_deref()) {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(term) = blank_to_none(query.search.as_deref()) {
            let pattern = like_pattern(term);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE)
                .push(" OR sku LIKE ")
                .push_bind(pattern)
                .push(LIKE_ESCAPE)
                .push(")");
        }
        // Mirrors StockStatus::classify
        match query.stock_status {
            Some(StockStatus::Low) => {
                qb.push(" AND current_stock <= min_stock");
            }
            Some(StockStatus::Medium) => {
                qb.push(" AND current_stock > min_stock AND current_stock <= min_stock * ")
                    .push_bind(medium_factor);
            }
            Some(StockStatus::Good) => {
                qb.push(" AND current_stock > min_stock AND current_stock > min_stock * ")
                    .push_bind(medium_factor);
            }
            None => {}
        }
        qb.push(format!(" ORDER BY {} {}, id ASC", column, order.as_sql()));

        let rows = qb.build_query_as::<InventoryRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(|r| r.into_item(medium_factor)).collect())
    }

    pub async fn find(
        pool: &SqlitePool,
        id: i64,
        medium_factor: f64,
    ) -> Result<Option<InventoryItem>, sqlx::Error> {
        let row: Option<InventoryRow> = sqlx::query_as("SELECT * FROM inventory_items WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.into_item(medium_factor)))
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateInventoryItemRequest,
        medium_factor: f64,
    ) -> Result<InventoryItem, sqlx::Error> {
        let ts = now();
        let id = sqlx::query(
            r#"
            INSERT INTO inventory_items
                (name, sku, category, current_stock, min_stock, unit_price, supplier, location, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.name.trim())
        .bind(req.sku.trim())
        .bind(blank_to_none(req.category.as_deref()))
        .bind(req.current_stock)
        .bind(req.min_stock)
        .bind(req.unit_price)
        .bind(blank_to_none(req.supplier.as_deref()))
        .bind(blank_to_none(req.location.as_deref()))
        .bind(&ts)
        .bind(&ts)
        .execute(pool)
        .await?
        .last_insert_rowid();

        Self::find(pool, id, medium_factor)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateInventoryItemRequest,
        medium_factor: f64,
    ) -> Result<Option<InventoryItem>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id, medium_factor).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE inventory_items SET
                name = ?, sku = ?, category = ?, current_stock = ?, min_stock = ?, unit_price = ?,
                supplier = ?, location = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.name.as_deref().map(str::trim).unwrap_or(&existing.name))
        .bind(req.sku.as_deref().map(str::trim).unwrap_or(&existing.sku))
        .bind(merge_optional(&req.category, &existing.category))
        .bind(req.current_stock.unwrap_or(existing.current_stock))
        .bind(req.min_stock.unwrap_or(existing.min_stock))
        .bind(req.unit_price.unwrap_or(existing.unit_price))
        .bind(merge_optional(&req.supplier, &existing.supplier))
        .bind(merge_optional(&req.location, &existing.location))
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;

        Self::find(pool, id, medium_factor).await
    }

    /// Add `delta` (possibly negative) to the current stock.
    ///
    /// The guard lives in the `UPDATE` itself so concurrent adjustments can
    /// never drive the stock negative.
    pub async fn adjust_stock(
        pool: &SqlitePool,
        id: i64,
        delta: i64,
        medium_factor: f64,
    ) -> Result<StockAdjustment, sqlx::Error> {
        let Some(before) = Self::find(pool, id, medium_factor).await? else {
            return Ok(StockAdjustment::NotFound);
        };

        if let Some(rejected) = Self::check_bounds(before.current_stock, delta) {
            return Ok(rejected);
        }

        // The stock is re-checked in SQL so concurrent adjustments cannot cross a bound
        let result = sqlx::query(
            r#"
            UPDATE inventory_items SET current_stock = current_stock + ?, updated_at = ?
            WHERE id = ? AND current_stock >= ? AND current_stock <= ?
            "#,
        )
        .bind(delta)
        .bind(now())
        .bind(id)
        .bind(delta.saturating_neg().max(0))
        .bind(MAX_STOCK_LEVEL - delta.max(0))
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(match Self::find(pool, id, medium_factor).await? {
                Some(item) => Self::check_bounds(item.current_stock, delta).unwrap_or(
                    StockAdjustment::Insufficient {
                        current_stock: item.current_stock,
                    },
                ),
                None => StockAdjustment::NotFound,
            });
        }

        match Self::find(pool, id, medium_factor).await? {
            Some(item) => Ok(StockAdjustment::Adjusted {
                item,
                previous_status: before.stock_status,
            }),
            None => Ok(StockAdjustment::NotFound),
        }
    }

    /// Classify a delta that would leave `[0, MAX_STOCK_LEVEL]`
    fn check_bounds(current_stock: i64, delta: i64) -> Option<StockAdjustment> {
        match current_stock.checked_add(delta) {
            Some(next) if (0..=MAX_STOCK_LEVEL).contains(&next) => None,
            Some(next) if next < 0 => Some(StockAdjustment::Insufficient { current_stock }),
            None if delta < 0 => Some(StockAdjustment::Insufficient { current_stock }),
            _ => Some(StockAdjustment::ExceedsLimit { current_stock }),
        }
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_low(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE current_stock <= min_stock")
            .fetch_one(pool)
            .await
    }

    pub async fn summary(pool: &SqlitePool, medium_factor: f64) -> Result<InventorySummary, sqlx::Error> {
        let (total_items, total_value, low_stock, medium_stock): (i64, f64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                CAST(COALESCE(SUM(current_stock * unit_price), 0) AS REAL),
                COALESCE(SUM(CASE WHEN current_stock <= min_stock THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN current_stock > min_stock AND current_stock <= min_stock * ? THEN 1 ELSE 0 END), 0)
            FROM inventory_items
            "#,
        )
        .bind(medium_factor)
        .fetch_one(pool)
        .await?;

        Ok(InventorySummary {
            total_items,
            total_value: round2(total_value),
            low_stock,
            medium_stock,
            good_stock: total_items - low_stock - medium_stock,
        })
    }
}
