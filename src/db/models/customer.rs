//! Customer records.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{
    blank_to_none, like_pattern, merge_optional, LIKE_ESCAPE, now, resolve_sort, QueryError, SortOrder,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuery {
    /// Substring match on name, email or company
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

pub const CUSTOMER_SORT_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("company", "company"),
    ("createdAt", "created_at"),
];

impl Customer {
    pub async fn list(pool: &SqlitePool, query: &CustomerQuery) -> Result<Vec<Customer>, QueryError> {
        let column = resolve_sort(query.sort.as_deref(), CUSTOMER_SORT_FIELDS, "name")?;
        let order = query.order.unwrap_or(SortOrder::Asc);

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM customers WHERE 1 = 1");
        if let Some(term) = blank_to_none(query.search.as_deref()) {
            let pattern = like_pattern(term);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE)
                .push(" OR email LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE)
                .push(" OR company LIKE ")
                .push_bind(pattern)
                .push(LIKE_ESCAPE)
                .push(")");
        }
        qb.push(format!(" ORDER BY {} {}, id ASC", column, order.as_sql()));

        Ok(qb.build_query_as::<Customer>().fetch_all(pool).await?)
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(pool)
            .await
    }

    /// Customers created within `[from, to)`
    pub async fn count_created_between(
        pool: &SqlitePool,
        from: &str,
        to: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE created_at >= ? AND created_at < ?")
            .bind(from)
            .bind(to)
            .fetch_one(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, req: &CreateCustomerRequest) -> Result<Customer, sqlx::Error> {
        let ts = now();
        let id = sqlx::query(
            r#"
            INSERT INTO customers (name, email, phone, address, company, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.name.trim())
        .bind(blank_to_none(req.email.as_deref()))
        .bind(blank_to_none(req.phone.as_deref()))
        .bind(blank_to_none(req.address.as_deref()))
        .bind(blank_to_none(req.company.as_deref()))
        .bind(blank_to_none(req.notes.as_deref()))
        .bind(&ts)
        .bind(&ts)
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Apply a partial update. Fields absent from the request keep their value;
    /// an empty string clears an optional field.
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateCustomerRequest,
    ) -> Result<Option<Customer>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE customers SET
                name = ?, email = ?, phone = ?, address = ?, company = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.name.as_deref().map(str::trim).unwrap_or(&existing.name))
        .bind(merge_optional(&req.email, &existing.email))
        .bind(merge_optional(&req.phone, &existing.phone))
        .bind(merge_optional(&req.address, &existing.address))
        .bind(merge_optional(&req.company, &existing.company))
        .bind(merge_optional(&req.notes, &existing.notes))
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;

        Self::find(pool, id).await
    }

    /// Delete a customer; their work orders are kept with `customer_id` cleared
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
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

    fn new_customer(name: &str, company: Option<&str>) -> CreateCustomerRequest {
        CreateCustomerRequest {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
            address: None,
            company: company.map(str::to_string),
            notes: Some("".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_blank_fields() {
        let pool = init_memory().await.unwrap();
        let c = Customer::create(&pool, &new_customer("Ada", None)).await.unwrap();
        assert_eq!(c.name, "Ada");
        assert_eq!(c.notes, None);
        assert_eq!(c.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_list_search_and_sort() {
        let pool = init_memory().await.unwrap();
        Customer::create(&pool, &new_customer("Zed", Some("Acme"))).await.unwrap();
        Customer::create(&pool, &new_customer("Bob", Some("Globex"))).await.unwrap();
        Customer::create(&pool, &new_customer("Cy", Some("Acme Labs"))).await.unwrap();

        let all = Customer::list(&pool, &CustomerQuery::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Cy", "Zed"]);

        let acme = Customer::list(
            &pool,
            &CustomerQuery {
                search: Some("acme".into()),
                sort: Some("name".into()),
                order: Some(SortOrder::Desc),
            },
        )
        .await
        .unwrap();
        let names: Vec<_> = acme.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Zed", "Cy"]);

        let bad = Customer::list(
            &pool,
            &CustomerQuery {
                sort: Some("id; DROP TABLE customers".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_search_wildcards_match_literally() {
        let pool = init_memory().await.unwrap();
        Customer::create(&pool, &new_customer("Plain", Some("Acme"))).await.unwrap();
        Customer::create(&pool, &new_customer("Half", Some("50% Off"))).await.unwrap();
        Customer::create(&pool, &new_customer("Under", Some("a_b Corp"))).await.unwrap();

        let search = |term: &str| CustomerQuery {
            search: Some(term.into()),
            ..Default::default()
        };

        let percent = Customer::list(&pool, &search("%")).await.unwrap();
        let names: Vec<_> = percent.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Half"]);

        let underscore = Customer::list(&pool, &search("_")).await.unwrap();
        let names: Vec<_> = underscore.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Under"]);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let pool = init_memory().await.unwrap();
        let c = Customer::create(&pool, &new_customer("Ada", Some("Acme"))).await.unwrap();

        let updated = Customer::update(
            &pool,
            c.id,
            &UpdateCustomerRequest {
                phone: Some("555-0100".into()),
                company: Some("".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.company, None);
        assert_eq!(updated.email, c.email);

        assert!(Customer::update(&pool, 999, &UpdateCustomerRequest::default())
            .await
            .unwrap()
            .is_none());
    }
}
