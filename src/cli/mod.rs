//! CLI module for the opsdesk command-line interface.
//!
//! Without a subcommand the binary runs the server. Subcommands:
//! - `status` - Check the health of a running server
//! - `config check` - Validate the configuration file
//! - `user create` - Create a profile directly in the database

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::crypto::{hash_password, validate_password_strength};
use crate::db::{self, Profile, Role};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "opsdesk")]
#[command(author, version, about = "Business operations backend", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "OPSDESK_CONFIG", default_value = "opsdesk.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "OPSDESK_LOG")]
    pub log_level: Option<String>,

    /// API URL to connect to
    #[arg(long, env = "OPSDESK_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Authentication token for client commands
    #[arg(long, env = "OPSDESK_TOKEN")]
    pub token: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show server status
    Status,

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Profile management commands
    #[command(subcommand)]
    User(UserCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// User subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create a profile in the local database
    Create {
        #[arg(long)]
        email: String,
        /// Full name
        #[arg(long)]
        name: String,
        /// admin, manager or staff
        #[arg(long, default_value = "staff")]
        role: String,
        #[arg(long, env = "OPSDESK_USER_PASSWORD")]
        password: String,
    },
}

/// Health response from /health
#[derive(Debug, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub database: bool,
}

/// Create an HTTP client with the given token
fn create_client(token: Option<&str>) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(token) = token {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token)
                .parse()
                .context("Invalid token format")?,
        );
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Status) => cmd_status(cli).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::User(UserCommands::Create {
            email,
            name,
            role,
            password,
        })) => cmd_user_create(cli, email, name, role, password).await,
        // No subcommand means start the server - this is handled in main.rs
        None => Ok(()),
    }
}

/// Display server status
async fn cmd_status(cli: &Cli) -> Result<()> {
    let client = create_client(cli.token.as_deref())?;
    let base_url = cli.api_url.trim_end_matches('/');

    println!("Connecting to {}...", base_url);

    let response = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .context("Failed to connect to server. Is opsdesk running?")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Server returned error {}: {}", status, body);
    }

    let health: HealthStatus = response
        .json()
        .await
        .context("Failed to parse health response")?;

    let healthy = health.status == "ok";
    println!();
    println!("=== opsdesk Server Status ===");
    println!();
    println!("Version:    v{}", health.version);
    println!(
        "Status:     {} {}",
        if healthy { "[OK]" } else { "[!!]" },
        if healthy { "Healthy" } else { "Degraded" }
    );
    println!(
        "Database:   {}",
        if health.database { "OK" } else { "FAILED" }
    );
    println!();
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!("[!!] Configuration file not found: {}", config_path.display());
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  API Port:     {}", config.server.api_port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!("  Static Dir:   {}", config.server.static_dir.display());
            println!(
                "  CORS:         {}",
                if config.server.cors_origins.is_empty() {
                    "same-origin only".to_string()
                } else {
                    config.server.cors_origins.join(", ")
                }
            );
            println!();
            println!("Auth:");
            println!("  Session TTL:  {}h", config.auth.session_ttl_hours);
            println!(
                "  Bootstrap:    {}",
                config.auth.admin_email.as_deref().unwrap_or("not configured")
            );
            println!();
            println!("Inventory:");
            println!("  Medium stock factor: {}", config.inventory.medium_stock_factor);
            println!();
            println!(
                "Rate Limiting: {}",
                if config.rate_limit.enabled {
                    format!(
                        "{} api / {} auth requests per {}s",
                        config.rate_limit.api_requests_per_window,
                        config.rate_limit.auth_requests_per_window,
                        config.rate_limit.window_seconds
                    )
                } else {
                    "Disabled".to_string()
                }
            );
            if !config.rate_limit.trusted_proxies.is_empty() {
                let proxies: Vec<String> = config
                    .rate_limit
                    .trusted_proxies
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!("  Trusted proxies: {}", proxies.join(", "));
            }
            println!();

            let mut warnings = Vec::new();
            if config.auth.admin_email.is_some() != config.auth.admin_password.is_some() {
                warnings.push("auth.admin_email and auth.admin_password must be set together");
            }
            if config.server.cors_origins.iter().any(|o| o == "*") {
                warnings.push("CORS allows any origin");
            }
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            anyhow::bail!("Invalid configuration file");
        }
    }
}

/// Create a profile without going through the API
async fn cmd_user_create(
    cli: &Cli,
    email: &str,
    name: &str,
    role: &str,
    password: &str,
) -> Result<()> {
    let role: Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    if let Some(problem) = validate_password_strength(password) {
        anyhow::bail!("Weak password: {}", problem);
    }

    let config = Config::load(&cli.config)?;
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;
    let pool = db::init(&config.server.data_dir).await?;

    if Profile::find_by_email(&pool, email.trim()).await?.is_some() {
        anyhow::bail!("A profile with email {} already exists", email);
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let profile = Profile::create(&pool, email, &password_hash, name, role).await?;

    println!("[OK] Created {} profile {} (id {})", profile.role, profile.email, profile.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "opsdesk",
            "user",
            "create",
            "--email",
            "a@example.com",
            "--name",
            "Ana",
            "--role",
            "manager",
            "--password",
            "password123",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::User(UserCommands::Create { email, role, .. })) => {
                assert_eq!(email, "a@example.com");
                assert_eq!(role, "manager");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_serves() {
        let cli = Cli::try_parse_from(["opsdesk", "--config", "custom.toml"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }

    #[test]
    fn test_config_check_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "opsdesk",
            "--config",
            dir.path().join("missing.toml").to_str().unwrap(),
            "config",
            "check",
        ])
        .unwrap();
        assert!(cmd_config_check(&cli).is_ok());
    }
}
