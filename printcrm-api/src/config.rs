/// Configuration management for the API server
///
/// Loaded from environment variables (a `.env` file is read first in
/// development).
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for permissive (default)
/// - `PRODUCTION`: `true` enables HSTS (default `false`)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `JWT_SECRET`: token signing key, at least 32 characters (required)
/// - `IDENTITY_PROVIDER`: `session` (default) or `fixed`
/// - `FIXED_IDENTITY_ID` / `FIXED_IDENTITY_EMAIL`: identity served by the
///   fixed provider (default: the demo identity)
/// - `DELETION_POLICY`: `best_effort` (default) or `halt_on_failure`
/// - `EXPORT_FILENAME_PREFIX`: export download prefix (default `printcrm`)
/// - `LOG_FORMAT`: `pretty` (default) or `json`
///
/// # Example
///
/// ```no_run
/// use printcrm_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use printcrm_shared::account::deletion::CascadePolicy;
use printcrm_shared::db::pool;
use printcrm_shared::identity::fixed::{DEMO_EMAIL, DEMO_USER_ID};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub identity: IdentityConfig,
    pub account: AccountConfig,
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Enables production-only headers such as HSTS
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Pool settings: the configured URL and size, default timeouts
    pub fn pool_config(&self) -> pool::DatabaseConfig {
        let mut config = pool::DatabaseConfig::new(self.url.clone());
        config.max_connections = self.max_connections;
        config.min_connections = config.min_connections.min(self.max_connections);
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be kept secret and be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

/// Which identity provider answers requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityProviderKind {
    /// Bearer JWT bound to a server-side session
    Session,

    /// One configured identity for every request
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub provider: IdentityProviderKind,
    pub fixed_id: Uuid,
    pub fixed_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub deletion_policy: CascadePolicy,
    pub export_filename_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got {:?}", name, other),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or any value is
    /// invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let api_host = var_or("API_HOST", "0.0.0.0");
        let api_port = var_or("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins: Vec<String> = var_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = parse_bool("PRODUCTION", &var_or("PRODUCTION", "false"))?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let provider = match var_or("IDENTITY_PROVIDER", "session").as_str() {
            "session" => IdentityProviderKind::Session,
            "fixed" => IdentityProviderKind::Fixed,
            other => anyhow::bail!("IDENTITY_PROVIDER must be session or fixed, got {:?}", other),
        };

        let fixed_id = match lookup("FIXED_IDENTITY_ID") {
            Some(raw) => Uuid::parse_str(raw.trim())
                .map_err(|e| anyhow::anyhow!("FIXED_IDENTITY_ID is invalid: {}", e))?,
            None => DEMO_USER_ID,
        };
        let fixed_email = var_or("FIXED_IDENTITY_EMAIL", DEMO_EMAIL);

        let deletion_policy = var_or("DELETION_POLICY", CascadePolicy::BestEffort.as_str())
            .parse::<CascadePolicy>()
            .map_err(|e| anyhow::anyhow!("DELETION_POLICY is invalid: {}", e))?;

        let export_filename_prefix = var_or("EXPORT_FILENAME_PREFIX", "printcrm");

        let log_format = match var_or("LOG_FORMAT", "pretty").as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => anyhow::bail!("LOG_FORMAT must be pretty or json, got {:?}", other),
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            identity: IdentityConfig {
                provider,
                fixed_id,
                fixed_email,
            },
            account: AccountConfig {
                deletion_policy,
                export_filename_prefix,
            },
            logging: LoggingConfig { format: log_format },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
