//! Quality standards and the inspections that apply them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{blank_to_none, double_option, merge_optional, now};
use crate::reports::percentage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Pending,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

fn default_check_status() -> CheckStatus {
    CheckStatus::Pending
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityStandard {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQualityStandardRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQualityStandardRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl QualityStandard {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<QualityStandard>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM quality_standards ORDER BY name ASC")
            .fetch_all(pool)
            .await
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<QualityStandard>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM quality_standards WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Ids from `ids` with no matching standard
    pub async fn missing_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        let mut missing = Vec::new();
        for id in ids {
            if Self::find(pool, *id).await?.is_none() {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateQualityStandardRequest,
    ) -> Result<QualityStandard, sqlx::Error> {
        let id = sqlx::query(
            "INSERT INTO quality_standards (name, description, category, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(req.name.trim())
        .bind(blank_to_none(req.description.as_deref()))
        .bind(blank_to_none(req.category.as_deref()))
        .bind(now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM quality_standards WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateQualityStandardRequest,
    ) -> Result<Option<QualityStandard>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        sqlx::query("UPDATE quality_standards SET name = ?, description = ?, category = ? WHERE id = ?")
            .bind(req.name.as_deref().map(str::trim).unwrap_or(&existing.name))
            .bind(merge_optional(&req.description, &existing.description))
            .bind(merge_optional(&req.category, &existing.category))
            .bind(id)
            .execute(pool)
            .await?;

        Self::find(pool, id).await
    }

    /// Delete a standard; it is unlinked from every check
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quality_standards WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Row shape of `quality_checks` without the linked standards
#[derive(Debug, Clone, FromRow)]
struct QualityCheckRow {
    id: i64,
    work_order_id: Option<i64>,
    inspector_id: Option<i64>,
    check_date: String,
    status: String,
    score: Option<f64>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheck {
    pub id: i64,
    pub work_order_id: Option<i64>,
    pub inspector_id: Option<i64>,
    pub check_date: String,
    pub status: String,
    pub score: Option<f64>,
    pub notes: Option<String>,
    pub standard_ids: Vec<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl QualityCheckRow {
    fn with_standards(self, standard_ids: Vec<i64>) -> QualityCheck {
        QualityCheck {
            id: self.id,
            work_order_id: self.work_order_id,
            inspector_id: self.inspector_id,
            check_date: self.check_date,
            status: self.status,
            score: self.score,
            notes: self.notes,
            standard_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQualityCheckRequest {
    pub work_order_id: Option<i64>,
    pub inspector_id: Option<i64>,
    /// Defaults to the current time
    pub check_date: Option<String>,
    #[serde(default = "default_check_status")]
    pub status: CheckStatus,
    pub score: Option<f64>,
    pub notes: Option<String>,
    #[serde(default)]
    pub standard_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQualityCheckRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub work_order_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub inspector_id: Option<Option<i64>>,
    pub check_date: Option<String>,
    pub status: Option<CheckStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub score: Option<Option<f64>>,
    pub notes: Option<String>,
    /// Replaces the linked set when present
    pub standard_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckQuery {
    pub status: Option<CheckStatus>,
    pub work_order_id: Option<i64>,
    pub inspector_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualitySummary {
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub pending: i64,
    pub pass_rate: f64,
}

impl QualitySummary {
    fn from_counts(passed: i64, failed: i64, pending: i64) -> Self {
        let decided = passed + failed;
        let pass_rate = percentage(passed as f64, decided as f64);
        Self {
            total: decided + pending,
            passed,
            failed,
            pending,
            pass_rate,
        }
    }
}

async fn standard_ids_for(pool: &SqlitePool, check_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT standard_id FROM quality_check_standards WHERE check_id = ? ORDER BY standard_id",
    )
    .bind(check_id)
    .fetch_all(pool)
    .await
}

async fn replace_standards(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    check_id: i64,
    standard_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM quality_check_standards WHERE check_id = ?")
        .bind(check_id)
        .execute(&mut **tx)
        .await?;
    for standard_id in standard_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO quality_check_standards (check_id, standard_id) VALUES (?, ?)",
        )
        .bind(check_id)
        .bind(standard_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl QualityCheck {
    /// List checks, newest check date first
    pub async fn list(pool: &SqlitePool, query: &QualityCheckQuery) -> Result<Vec<QualityCheck>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM quality_checks WHERE 1 = 1");
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(work_order_id) = query.work_order_id {
            qb.push(" AND work_order_id = ").push_bind(work_order_id);
        }
        if let Some(inspector_id) = query.inspector_id {
            qb.push(" AND inspector_id = ").push_bind(inspector_id);
        }
        qb.push(" ORDER BY check_date DESC, id DESC");

        let rows = qb.build_query_as::<QualityCheckRow>().fetch_all(pool).await?;
        let mut checks = Vec::with_capacity(rows.len());
        for row in rows {
            let ids = standard_ids_for(pool, row.id).await?;
            checks.push(row.with_standards(ids));
        }
        Ok(checks)
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<QualityCheck>, sqlx::Error> {
        let row: Option<QualityCheckRow> = sqlx::query_as("SELECT * FROM quality_checks WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        match row {
            Some(row) => {
                let ids = standard_ids_for(pool, row.id).await?;
                Ok(Some(row.with_standards(ids)))
            }
            None => Ok(None),
        }
    }

    /// Insert the check and its standard links in one transaction
    pub async fn create(
        pool: &SqlitePool,
        req: &CreateQualityCheckRequest,
    ) -> Result<QualityCheck, sqlx::Error> {
        let ts = now();
        let check_date = req.check_date.clone().unwrap_or_else(|| ts.clone());

        let mut tx = pool.begin().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO quality_checks
                (work_order_id, inspector_id, check_date, status, score, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.work_order_id)
        .bind(req.inspector_id)
        .bind(&check_date)
        .bind(req.status.to_string())
        .bind(req.score)
        .bind(blank_to_none(req.notes.as_deref()))
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        replace_standards(&mut tx, id, &req.standard_ids).await?;
        tx.commit().await?;

        Self::find(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateQualityCheckRequest,
    ) -> Result<Option<QualityCheck>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE quality_checks SET
                work_order_id = ?, inspector_id = ?, check_date = ?, status = ?, score = ?,
                notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.work_order_id.unwrap_or(existing.work_order_id))
        .bind(req.inspector_id.unwrap_or(existing.inspector_id))
        .bind(req.check_date.as_deref().unwrap_or(&existing.check_date))
        .bind(req.status.map(|s| s.to_string()).unwrap_or(existing.status.clone()))
        .bind(req.score.unwrap_or(existing.score))
        .bind(merge_optional(&req.notes, &existing.notes))
        .bind(now())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if let Some(standard_ids) = &req.standard_ids {
            replace_standards(&mut tx, id, standard_ids).await?;
        }
        tx.commit().await?;

        Self::find(pool, id).await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quality_checks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn summary(pool: &SqlitePool) -> Result<QualitySummary, sqlx::Error> {
        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM quality_checks GROUP BY status")
                .fetch_all(pool)
                .await?;

        let count_of = |status: &str| {
            counts
                .iter()
                .find(|(s, _)| s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        Ok(QualitySummary::from_counts(
            count_of("pass"),
            count_of("fail"),
            count_of("pending"),
        ))
    }
}
