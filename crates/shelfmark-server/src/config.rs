//! Application configuration.
//!
//! Loaded from `shelfmark.toml` merged with `SHELFMARK__SECTION__KEY`
//! environment overrides, e.g. `SHELFMARK__SERVER__PORT=9090`.

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// JWT secrets and lifetimes
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outbound email (SMTP absent -> console transport)
    #[serde(default)]
    pub mail: MailConfig,
    /// Thumbnail upload storage
    #[serde(default)]
    pub uploads: UploadsConfig,
    /// Rate limiting for the auth endpoints
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Background maintenance cadence
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        // Storage validation - PostgreSQL is required
        if self.storage.postgres.is_none() {
            return Err("storage.postgres config is required".into());
        }
        if let Some(ref pg) = self.storage.postgres {
            if pg.url.is_none() && pg.host.is_empty() {
                return Err("storage.postgres requires either 'url' or 'host' to be set".into());
            }
            if pg.url.is_none() && pg.database.is_empty() {
                return Err("storage.postgres.database must not be empty".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        // Auth validation
        if self.auth.access_secret.len() < 32 || self.auth.refresh_secret.len() < 32 {
            return Err("auth secrets must be at least 32 characters".into());
        }
        if self.auth.access_secret == self.auth.refresh_secret {
            return Err("auth.access_secret and auth.refresh_secret must differ".into());
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            return Err("auth token lifetimes must be > 0".into());
        }
        if self.auth.access_ttl_secs >= self.auth.refresh_ttl_secs {
            return Err("auth.access_ttl_secs must be shorter than auth.refresh_ttl_secs".into());
        }
        // Rate limit validation
        if self.rate_limit.enabled
            && (self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0)
        {
            return Err("rate_limit window and max_requests must be > 0".into());
        }
        // Uploads validation
        if self.uploads.max_bytes == 0 {
            return Err("uploads.max_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

// =============================================================================
// Server
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Allowed CORS origins; empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cors_origins: Vec::new(),
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: Option<PostgresStorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    /// Full connection URL; takes precedence over the discrete fields.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pg_host")]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default = "default_pg_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_pg_database")]
    pub database: String,
    #[serde(default = "default_pg_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_pg_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_user() -> String {
    "postgres".to_string()
}

fn default_pg_database() -> String {
    "shelfmark".to_string()
}

fn default_pg_pool_size() -> u32 {
    10
}

fn default_pg_connect_timeout_ms() -> u64 {
    5000
}

impl PostgresStorageConfig {
    /// The effective connection URL.
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            ),
        }
    }
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_pg_host(),
            port: default_pg_port(),
            user: default_pg_user(),
            password: String::new(),
            database: default_pg_database(),
            pool_size: default_pg_pool_size(),
            connect_timeout_ms: default_pg_connect_timeout_ms(),
        }
    }
}

// =============================================================================
// Redis
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    /// Default: false (disabled for single-instance deployments)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for access tokens.
    #[serde(default)]
    pub access_secret: String,
    /// HS256 secret for refresh tokens; must differ from the access secret.
    #[serde(default)]
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

fn default_access_ttl_secs() -> u64 {
    900 // 15 minutes
}

fn default_refresh_ttl_secs() -> u64 {
    604_800 // 7 days
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
        }
    }
}

// =============================================================================
// Mail
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host; when absent, emails are logged instead of sent.
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_mail_from")]
    pub from: String,
    /// Base URL used for links embedded in emails.
    #[serde(default = "default_frontend_base_url")]
    pub frontend_base_url: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_from() -> String {
    "Shelfmark <no-reply@shelfmark.dev>".to_string()
}

fn default_frontend_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from: default_mail_from(),
            frontend_base_url: default_frontend_base_url(),
        }
    }
}

// =============================================================================
// Uploads
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Root directory for stored files.
    #[serde(default = "default_uploads_dir")]
    pub dir: String,
    /// Maximum accepted request body size.
    #[serde(default = "default_uploads_max_bytes")]
    pub max_bytes: usize,
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_uploads_max_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            max_bytes: default_uploads_max_bytes(),
        }
    }
}

// =============================================================================
// Rate limiting
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Fixed window length.
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
    /// Requests allowed per identifier per window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: i64,
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_rate_limit_window_secs() -> u64 {
    900
}

fn default_rate_limit_max_requests() -> i64 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            window_secs: default_rate_limit_window_secs(),
            max_requests: default_rate_limit_max_requests(),
        }
    }
}

// =============================================================================
// Cache TTLs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_book_ttl_secs")]
    pub book_ttl_secs: u64,
    /// List results churn faster than single entities.
    #[serde(default = "default_list_ttl_secs")]
    pub list_ttl_secs: u64,
    #[serde(default = "default_user_ttl_secs")]
    pub user_ttl_secs: u64,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_stats_ttl_secs")]
    pub stats_ttl_secs: u64,
}

fn default_book_ttl_secs() -> u64 {
    600
}

fn default_list_ttl_secs() -> u64 {
    300
}

fn default_user_ttl_secs() -> u64 {
    600
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_stats_ttl_secs() -> u64 {
    600
}

impl CacheConfig {
    pub fn book_ttl(&self) -> Duration {
        Duration::from_secs(self.book_ttl_secs)
    }

    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs)
    }

    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            book_ttl_secs: default_book_ttl_secs(),
            list_ttl_secs: default_list_ttl_secs(),
            user_ttl_secs: default_user_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            stats_ttl_secs: default_stats_ttl_secs(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_level")]
    pub level: String,
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
        }
    }
}

// =============================================================================
// Maintenance
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Interval between expired-token sweeps.
    #[serde(default = "default_token_sweep_interval_secs")]
    pub token_sweep_interval_secs: u64,
}

fn default_token_sweep_interval_secs() -> u64 {
    3600
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            token_sweep_interval_secs: default_token_sweep_interval_secs(),
        }
    }
}

// =============================================================================
// Loader
// =============================================================================

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("shelfmark.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., SHELFMARK__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("SHELFMARK")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.storage.postgres = Some(PostgresStorageConfig::default());
        cfg.auth.access_secret = "a".repeat(32);
        cfg.auth.refresh_secret = "b".repeat(32);
        cfg
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_postgres_rejected() {
        let mut cfg = valid_config();
        cfg.storage.postgres = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut cfg = valid_config();
        cfg.auth.access_secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        let mut cfg = valid_config();
        cfg.auth.refresh_secret = cfg.auth.access_secret.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_access_ttl_must_be_shorter() {
        let mut cfg = valid_config();
        cfg.auth.access_ttl_secs = cfg.auth.refresh_ttl_secs;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_connection_url_from_fields() {
        let pg = PostgresStorageConfig {
            user: "shelf".to_string(),
            password: "secret".to_string(),
            host: "db".to_string(),
            port: 5433,
            database: "catalog".to_string(),
            ..PostgresStorageConfig::default()
        };
        assert_eq!(
            pg.connection_url(),
            "postgres://shelf:secret@db:5433/catalog"
        );
    }

    #[test]
    fn test_connection_url_prefers_explicit() {
        let pg = PostgresStorageConfig {
            url: Some("postgres://explicit/db".to_string()),
            ..PostgresStorageConfig::default()
        };
        assert_eq!(pg.connection_url(), "postgres://explicit/db");
    }

    #[test]
    fn test_invalid_logging_level_rejected() {
        let mut cfg = valid_config();
        cfg.logging.level = "verbose".to_string();
        assert!(cfg.validate().is_err());
    }
}
