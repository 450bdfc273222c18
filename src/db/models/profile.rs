//! Profile (authenticated user) and session models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::now;

/// Profile roles. Only admins may reach the user-management routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Admins and managers receive operational notifications
    pub fn receives_alerts(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Manager => write!(f, "manager"),
            Role::Staff => write!(f, "staff"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::Staff)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Public view of a profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            role: p.role,
            avatar_url: p.avatar_url,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl Profile {
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }

    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles WHERE email = ? COLLATE NOCASE")
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles ORDER BY full_name ASC")
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(pool)
            .await
    }

    /// Ids of every profile whose role receives operational alerts
    pub async fn alert_recipients(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM profiles WHERE role IN ('admin', 'manager')")
            .fetch_all(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        email: &str,
        password_hash: &str,
        full_name: &str,
        role: Role,
    ) -> Result<Profile, sqlx::Error> {
        let ts = now();
        let id = sqlx::query(
            r#"
            INSERT INTO profiles (email, password_hash, full_name, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(email.trim())
        .bind(password_hash)
        .bind(full_name.trim())
        .bind(role.to_string())
        .bind(&ts)
        .bind(&ts)
        .execute(pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_details(
        pool: &SqlitePool,
        id: i64,
        req: &UpdateProfileRequest,
    ) -> Result<Option<Profile>, sqlx::Error> {
        let Some(existing) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        let full_name = req
            .full_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.full_name);
        let avatar_url = match &req.avatar_url {
            Some(url) if url.is_empty() => None,
            Some(url) => Some(url.as_str()),
            None => existing.avatar_url.as_deref(),
        };

        sqlx::query("UPDATE profiles SET full_name = ?, avatar_url = ?, updated_at = ? WHERE id = ?")
            .bind(full_name)
            .bind(avatar_url)
            .bind(now())
            .bind(id)
            .execute(pool)
            .await?;

        Self::find(pool, id).await
    }

    pub async fn set_role(
        pool: &SqlitePool,
        id: i64,
        role: Role,
    ) -> Result<Option<Profile>, sqlx::Error> {
        let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.to_string())
            .bind(now())
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find(pool, id).await
    }

    pub async fn set_password(
        pool: &SqlitePool,
        id: i64,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete a profile; sessions and notifications cascade
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub profile_id: i64,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

impl Session {
    pub async fn create(
        pool: &SqlitePool,
        profile_id: i64,
        token_hash: &str,
        expires_at: &str,
    ) -> Result<(), sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO sessions (id, profile_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(profile_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a session by token hash that has not yet expired
    pub async fn find_active(
        pool: &SqlitePool,
        token_hash: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(token_hash)
            .bind(now())
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_by_token_hash(
        pool: &SqlitePool,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub profile: ProfileResponse,
}

/// Request for the first-run setup that creates the initial admin
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Admin request to create a profile
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Staff
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    /// Empty string clears the avatar
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::from("bogus".to_string()), Role::Staff);
        assert!(Role::Manager.receives_alerts());
        assert!(!Role::Staff.receives_alerts());
        assert!(!Role::Manager.is_admin());
    }

    #[test]
    fn test_profile_response_hides_hash() {
        let profile = Profile {
            id: 1,
            email: "a@example.com".into(),
            password_hash: "secret".into(),
            full_name: "A".into(),
            role: "staff".into(),
            avatar_url: None,
            created_at: now(),
            updated_at: now(),
        };
        let json = serde_json::to_value(ProfileResponse::from(profile)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullName"], "A");
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let pool = init_memory().await.unwrap();
        Profile::create(&pool, "Ops@Example.com", "x", "Ops", Role::Manager)
            .await
            .unwrap();
        let found = Profile::find_by_email(&pool, "ops@example.com").await.unwrap();
        assert!(found.is_some());
        assert_eq!(Profile::alert_recipients(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_ignored() {
        let pool = init_memory().await.unwrap();
        let p = Profile::create(&pool, "s@example.com", "x", "S", Role::Staff)
            .await
            .unwrap();
        Session::create(&pool, p.id, "live", "2999-01-01T00:00:00Z").await.unwrap();
        Session::create(&pool, p.id, "dead", "2000-01-01T00:00:00Z").await.unwrap();

        assert!(Session::find_active(&pool, "live").await.unwrap().is_some());
        assert!(Session::find_active(&pool, "dead").await.unwrap().is_none());
        assert_eq!(Session::delete_expired(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_sessions() {
        let pool = init_memory().await.unwrap();
        let p = Profile::create(&pool, "c@example.com", "x", "C", Role::Staff)
            .await
            .unwrap();
        Session::create(&pool, p.id, "tok", "2999-01-01T00:00:00Z").await.unwrap();
        assert!(Profile::delete(&pool, p.id).await.unwrap());
        assert!(Session::find_active(&pool, "tok").await.unwrap().is_none());
    }
}
