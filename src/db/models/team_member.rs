//! Team members (field staff, technicians, office) and their workload.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{
    blank_to_none, double_option, like_pattern, merge_optional, LIKE_ESCAPE, now, resolve_sort, QueryError, SortOrder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberStatus {
    Active,
    Inactive,
    OnLeave,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::OnLeave => write!(f, "on-leave"),
        }
    }
}

impl std::str::FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "on-leave" => Ok(Self::OnLeave),
            _ => Err(format!("Unknown member status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: String,
    pub department: Option<String>,
    pub status: String,
    pub hourly_rate: Option<f64>,
    pub hire_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamMemberRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: String,
    pub department: Option<String>,
    #[serde(default = "default_status")]
    pub status: MemberStatus,
    pub hourly_rate: Option<f64>,
    pub hire_date: Option<String>,
}

fn default_status() -> MemberStatus {
    MemberStatus::Active
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamMemberRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub status: Option<MemberStatus>,
    /// `null` clears the rate
    #[serde(default, deserialize_with = "double_option")]
    pub hourly_rate: Option<Option<f64>>,
    pub hire_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberQuery {
    pub status: Option<MemberStatus>,
    pub department: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

pub const TEAM_MEMBER_SORT_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("position", "position"),
    ("department", "department"),
    ("hireDate", "hire_date"),
    ("createdAt", "created_at"),
];

/// Member with the number of work orders still open against them
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberWorkload {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub status: String,
    pub open_work_orders: i64,
}

impl TeamMember {
    pub async fn list(pool: &SqlitePool, query: &TeamMemberQuery) -> Result<Vec<TeamMember>, QueryError> {
        let column = resolve_sort(query.sort.as_deref(), TEAM_MEMBER_SORT_FIELDS, "name")?;
        let order = query.order.unwrap_or(SortOrder::Asc);

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM team_members WHERE 1 = 1");
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(department) = blank_to_none(query.department.as_deref()) {
            qb.push(" AND department = ").push_bind(department.to_string());
        }
        if let Some(term) = blank_to_none(query.search.as_deref()) {
            let pattern = like_pattern(term);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE)
                .push(" OR position LIKE ")
                .push_bind(pattern)
                .push(LIKE_ESCAPE)
                .push(")");
        }
        qb.push(format!(" ORDER BY {} {}, id ASC", column, order.as_sql()));

        Ok(qb.build_query_as::<TeamMember>().fetch_all(pool).await?)
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<TeamMember>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM team_members WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn count_active(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE status = 'active'")
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateTeamMemberRequest,
    ) -> Result<TeamMember, sqlx::Error> {
        let ts = now();
        let id = sqlx::query(
            r#"
            INSERT INTO team_members
                (name, email, phone, position, department, status, hourly_rate, hire_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.name.trim())
        .bind(blank_to_none(req.email.as_deref()))
        .bind(blank_to_none(req.phone.as_deref()))
        .bind(req.position.trim())
        .bind(blank_to_none(req.department.as_deref()))
        .bind(req.status.to_string())
        .bind(req.hourly_rate)
        .bind(blank_to_none(req.hire_date.as_deref()))
        .bind(&ts)
        .bind(&ts)
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM team_members WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateTeamMemberRequest,
    ) -> Result<Option<TeamMember>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        let status = req
            .status
            .map(|s| s.to_string())
            .unwrap_or(existing.status.clone());

        sqlx::query(
            r#"
            UPDATE team_members SET
                name = ?, email = ?, phone = ?, position = ?, department = ?, status = ?,
                hourly_rate = ?, hire_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.name.as_deref().map(str::trim).unwrap_or(&existing.name))
        .bind(merge_optional(&req.email, &existing.email))
        .bind(merge_optional(&req.phone, &existing.phone))
        .bind(req.position.as_deref().map(str::trim).unwrap_or(&existing.position))
        .bind(merge_optional(&req.department, &existing.department))
        .bind(status)
        .bind(req.hourly_rate.unwrap_or(existing.hourly_rate))
        .bind(merge_optional(&req.hire_date, &existing.hire_date))
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;

        Self::find(pool, id).await
    }

    /// Delete a member; work-order assignments and schedule links are cleared
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every member with their count of pending or in-progress work orders,
    /// busiest first
    pub async fn workload(pool: &SqlitePool) -> Result<Vec<TeamMemberWorkload>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT tm.id, tm.name, tm.position, tm.status,
                   COUNT(wo.id) AS open_work_orders
            FROM team_members tm
            LEFT JOIN work_orders wo
                ON wo.assigned_to = tm.id AND wo.status IN ('pending', 'in-progress')
            GROUP BY tm.id
            ORDER BY open_work_orders DESC, tm.name ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
