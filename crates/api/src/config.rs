//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPKEEP_DATABASE_URL` - `SQLite` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHOPKEEP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPKEEP_PORT` - Listen port (default: 3000)
//! - `SHOPKEEP_CORS_ORIGIN` - Browser origin allowed to call the API (e.g. the UI dev server)
//! - `SHOPKEEP_AUTO_MIGRATE` - Run migrations on startup (default: false)
//! - `SHOPKEEP_STORE_TIMEOUT_MS` - Pool acquire and `SQLite` busy timeout (default: 5000)
//! - `SHOPKEEP_RETRY_ATTEMPTS` - Attempts for contended cart writes, 1-10 (default: 3)
//! - `SHOPKEEP_RETRY_BACKOFF_MS` - Initial retry backoff (default: 25)
//! - `SHOPKEEP_CATALOG_CACHE_TTL_SECS` - Catalog cache TTL (default: 300)
//! - `CHAT_SERVICE_URL` - Chat collaborator base URL; `/chat` answers 503 when unset
//! - `CHAT_SERVICE_API_KEY` - Bearer token for the chat collaborator
//! - `CHAT_TIMEOUT_SECS` - Chat request timeout (default: 30)
//! - `CHAT_MAX_RETRIES` - Chat attempts for network errors and 5xx, 1-10 (default: 3)
//! - `LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MAX_ATTEMPTS: u32 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log aggregation.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `SQLite` database connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origin for the browser UI
    pub cors_origin: Option<String>,
    /// Run embedded migrations before serving
    pub auto_migrate: bool,
    /// Store timeouts, retries and caching
    pub store: StoreConfig,
    /// Chat collaborator, if configured
    pub chat: Option<ChatConfig>,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Store access tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Upper bound on waiting for a connection or a write lock.
    pub timeout: Duration,
    /// Attempts for a cart write that lost a lock race.
    pub retry_attempts: u32,
    /// Backoff before the first retry; doubles each attempt.
    pub retry_backoff: Duration,
    /// How long catalog lookups stay cached.
    pub catalog_cache_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(25),
            catalog_cache_ttl: Duration::from_secs(300),
        }
    }
}

/// Chat collaborator configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ChatConfig {
    /// Base URL; requests go to `{base_url}/chat`
    pub base_url: Url,
    /// Optional bearer token
    pub api_key: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts for network errors and 5xx responses
    pub max_retries: u32,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Where configuration values come from.
///
/// Production reads the process environment; tests pass a map.
trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| (*v).to_string())
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_source(&ProcessEnv)
    }

    fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let database_url = get_database_url(env, "SHOPKEEP_DATABASE_URL")?;
        let host = parse_env_or_default(env, "SHOPKEEP_HOST", "127.0.0.1")?;
        let port = parse_env_or_default(env, "SHOPKEEP_PORT", "3000")?;
        let cors_origin = get_optional_env(env, "SHOPKEEP_CORS_ORIGIN");
        let auto_migrate = parse_env_or_default(env, "SHOPKEEP_AUTO_MIGRATE", "false")?;
        let store = StoreConfig::from_source(env)?;
        let chat = ChatConfig::from_source(env)?;
        let log_format = parse_env_or_default(env, "LOG_FORMAT", "text")?;
        let sentry_dsn = get_optional_env(env, "SENTRY_DSN");
        let sentry_environment = get_optional_env(env, "SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            cors_origin,
            auto_migrate,
            store,
            chat,
            log_format,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StoreConfig {
    fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let timeout_ms: u64 = parse_env_or_default(env, "SHOPKEEP_STORE_TIMEOUT_MS", "5000")?;
        let retry_attempts = parse_attempts(env, "SHOPKEEP_RETRY_ATTEMPTS", "3")?;
        let backoff_ms: u64 = parse_env_or_default(env, "SHOPKEEP_RETRY_BACKOFF_MS", "25")?;
        let ttl_secs: u64 = parse_env_or_default(env, "SHOPKEEP_CATALOG_CACHE_TTL_SECS", "300")?;

        if timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPKEEP_STORE_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            timeout: Duration::from_millis(timeout_ms),
            retry_attempts,
            retry_backoff: Duration::from_millis(backoff_ms),
            catalog_cache_ttl: Duration::from_secs(ttl_secs),
        })
    }
}

impl ChatConfig {
    fn from_source(env: &impl EnvSource) -> Result<Option<Self>, ConfigError> {
        let Some(raw_url) = get_optional_env(env, "CHAT_SERVICE_URL") else {
            return Ok(None);
        };

        let base_url = Url::parse(raw_url.trim_end_matches('/')).map_err(|e| {
            ConfigError::InvalidEnvVar("CHAT_SERVICE_URL".to_string(), e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "CHAT_SERVICE_URL".to_string(),
                "must start with http:// or https://".to_string(),
            ));
        }

        let api_key = match get_optional_env(env, "CHAT_SERVICE_API_KEY") {
            Some(key) => {
                validate_secret_strength(&key, "CHAT_SERVICE_API_KEY")?;
                Some(SecretString::from(key))
            }
            None => None,
        };

        let timeout_secs: u64 = parse_env_or_default(env, "CHAT_TIMEOUT_SECS", "30")?;
        let max_retries = parse_attempts(env, "CHAT_MAX_RETRIES", "3")?;

        Ok(Some(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(env: &impl EnvSource, primary_key: &str) -> Result<SecretString, ConfigError> {
    env.get(primary_key)
        .or_else(|| env.get("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(env: &impl EnvSource, key: &str) -> Option<String> {
    env.get(key).filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(env: &impl EnvSource, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = get_optional_env(env, key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an attempt count in `1..=MAX_ATTEMPTS`.
fn parse_attempts(env: &impl EnvSource, key: &str, default: &str) -> Result<u32, ConfigError> {
    let attempts: u32 = parse_env_or_default(env, key, default)?;
    if !(1..=MAX_ATTEMPTS).contains(&attempts) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 1 and {MAX_ATTEMPTS} (got {attempts})"),
        ));
    }
    Ok(attempts)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
