use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory holding the built dashboard (index.html plus assets)
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Allowed CORS origins. Empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
            static_dir: default_static_dir(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static/dist")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Static API token that authenticates as a system administrator
    #[serde(default = "default_admin_token")]
    pub admin_token: String,
    /// Lifetime of a login session in hours (default: 7 days)
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Bootstrap admin account created on first start if no profile exists
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: default_admin_token(),
            session_ttl_hours: default_session_ttl_hours(),
            admin_email: None,
            admin_password: None,
        }
    }
}

fn default_admin_token() -> String {
    // Generate a random token if not provided
    uuid::Uuid::new_v4().to_string()
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Items at or below `min_stock * medium_stock_factor` are reported as medium
    #[serde(default = "default_medium_stock_factor")]
    pub medium_stock_factor: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            medium_stock_factor: default_medium_stock_factor(),
        }
    }
}

fn default_medium_stock_factor() -> f64 {
    1.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Reverse proxies whose `X-Forwarded-For`/`X-Real-IP` headers are honoured.
    /// Requests from any other peer are keyed on the socket address.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            window_seconds: default_window_seconds(),
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_window_seconds() -> u64 {
    60
}

fn default_api_requests() -> u32 {
    300
}

fn default_auth_requests() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            inventory: InventoryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Service credentials may come from the environment instead of the file
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("OPSDESK_ADMIN_TOKEN") {
            if !token.is_empty() {
                self.auth.admin_token = token;
            }
        }
        if let Ok(password) = std::env::var("OPSDESK_ADMIN_PASSWORD") {
            if !password.is_empty() {
                self.auth.admin_password = Some(password);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            bail!("server.host must not be empty");
        }
        if self.server.api_port == 0 {
            bail!("server.api_port must be greater than 0");
        }
        if self.auth.admin_token.len() < 16 {
            bail!("auth.admin_token must be at least 16 characters");
        }
        if self.auth.session_ttl_hours <= 0 {
            bail!("auth.session_ttl_hours must be positive");
        }
        let factor = self.inventory.medium_stock_factor;
        if !factor.is_finite() || factor < 1.0 {
            bail!("inventory.medium_stock_factor must be a finite number of at least 1.0");
        }
        if self.rate_limit.window_seconds == 0 {
            bail!("rate_limit.window_seconds must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.api_port, 8080);
        assert_eq!(config.auth.session_ttl_hours, 168);
        assert!((config.inventory.medium_stock_factor - 1.5).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            api_port = 9000

            [inventory]
            medium_stock_factor = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.api_port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!((config.inventory.medium_stock_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.rate_limit.auth_requests_per_window, 20);
        assert!(config.rate_limit.trusted_proxies.is_empty());
    }

    #[test]
    fn test_trusted_proxies_and_nan_factor_from_toml() {
        let config = Config::from_toml(
            r#"
            [rate_limit]
            trusted_proxies = ["10.0.0.1", "::1"]

            [inventory]
            medium_stock_factor = nan
            "#,
        )
        .unwrap();

        assert_eq!(
            config.rate_limit.trusted_proxies,
            vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse::<IpAddr>().unwrap()]
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.inventory.medium_stock_factor = 0.5;
        assert!(config.validate().is_err());

        for factor in [f64::NAN, f64::INFINITY] {
            let mut config = Config::default();
            config.inventory.medium_stock_factor = factor;
            assert!(config.validate().is_err(), "factor {} accepted", factor);
        }

        let mut config = Config::default();
        config.auth.session_ttl_hours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.admin_token = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[auth]\nadmin_token = \"0123456789abcdef0123\"\nsession_ttl_hours = 12"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.auth.session_ttl_hours, 12);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/opsdesk.toml")).unwrap();
        assert_eq!(config.server.api_port, 8080);
    }
}
