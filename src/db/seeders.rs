//! Database seeders for bootstrap data
//!
//! Creates the initial administrator from configuration so a fresh install
//! can be logged into without going through the setup flow.

use anyhow::{anyhow, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{Profile, Role};
use crate::config::AuthConfig;
use crate::crypto;

/// Create the configured admin profile when the database has no profiles yet.
///
/// Returns `true` if a profile was created.
pub async fn ensure_admin_profile(pool: &SqlitePool, auth: &AuthConfig) -> Result<bool> {
    let (Some(email), Some(password)) = (auth.admin_email.as_deref(), auth.admin_password.as_deref())
    else {
        return Ok(false);
    };

    if Profile::count(pool).await? > 0 {
        return Ok(false);
    }

    if let Some(problem) = crypto::validate_password_strength(password) {
        warn!(email = %email, "Configured admin password rejected: {}", problem);
        return Ok(false);
    }

    let hash = crypto::hash_password(password)
        .map_err(|e| anyhow!("Failed to hash admin password: {}", e))?;
    let profile = Profile::create(pool, email, &hash, "Administrator", Role::Admin).await?;
    info!(profile_id = profile.id, email = %profile.email, "Seeded admin profile");
    Ok(true)
}
