//! Kiosk configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KIOSK_API_BASE_URL` - Base URL of the catalog/analysis API
//!
//! ## Optional
//! - `KIOSK_HOST` - Bind address (default: 127.0.0.1)
//! - `KIOSK_PORT` - Listen port (default: 3000)
//! - `KIOSK_UPLOAD_TIMEOUT_SECS` - Upper bound for one analysis upload (default: 30)
//! - `KIOSK_REQUEST_TIMEOUT_SECS` - Upper bound for catalog reads (default: 15)
//! - `KIOSK_MAX_UPLOAD_BYTES` - Largest accepted capture (default: 10 MiB)
//! - `KIOSK_SKIP_TUNNEL_WARNING` - Send `ngrok-skip-browser-warning` upstream (default: true)
//! - `KIOSK_PLACEHOLDER_IMAGES` - Local placeholder images available (default: 9)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PLACEHOLDER_IMAGES: u32 = 9;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Kiosk application configuration.
#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Remote catalog and analysis API
    pub api: ApiConfig,
    /// Largest capture body accepted from the kiosk page
    pub max_upload_bytes: usize,
    /// Sentry configuration
    pub sentry: SentryConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://snacks.example.net`
    pub base_url: Url,
    /// Upper bound for one analysis upload
    pub upload_timeout: Duration,
    /// Upper bound for catalog reads
    pub request_timeout: Duration,
    /// Send `ngrok-skip-browser-warning: true` so tunnels return JSON, not an interstitial
    pub skip_tunnel_warning: bool,
    /// Number of local placeholder images (`snack-1.png` ..= `snack-N.png`)
    pub placeholder_images: u32,
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl KioskConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("KIOSK_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("KIOSK_PORT", "3000")?;
        let max_upload_bytes = parse_env_or_default::<usize>(
            "KIOSK_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;

        Ok(Self {
            host,
            port,
            api: ApiConfig::from_env()?,
            max_upload_bytes,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ApiConfig {
    /// Build an API configuration with defaults for everything but the URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("KIOSK_API_BASE_URL", base_url)?,
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            skip_tunnel_warning: true,
            placeholder_images: DEFAULT_PLACEHOLDER_IMAGES,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_required_env("KIOSK_API_BASE_URL")?;
        let mut config = Self::new(&base_url)?;

        config.upload_timeout = get_duration_secs(
            "KIOSK_UPLOAD_TIMEOUT_SECS",
            DEFAULT_UPLOAD_TIMEOUT_SECS,
        )?;
        config.request_timeout = get_duration_secs(
            "KIOSK_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        config.skip_tunnel_warning = parse_env_or_default::<bool>("KIOSK_SKIP_TUNNEL_WARNING", "true")?;
        config.placeholder_images = parse_env_or_default::<u32>(
            "KIOSK_PLACEHOLDER_IMAGES",
            &DEFAULT_PLACEHOLDER_IMAGES.to_string(),
        )?;

        Ok(config)
    }

    /// Join a path onto the base URL.
    ///
    /// The base URL may carry a path prefix (`https://host/api`); it is kept.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a positive number of seconds.
fn get_duration_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs = parse_env_or_default::<u64>(key, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate that a base URL is absolute and uses http or https.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must have a host".to_string(),
        ));
    }

    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_accepts_https() {
        let url = parse_base_url("TEST", "https://snacks.example.net").unwrap();
        assert_eq!(url.host_str(), Some("snacks.example.net"));
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        let err = parse_base_url("TEST", "ftp://snacks.example.net").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_parse_base_url_rejects_relative() {
        assert!(parse_base_url("TEST", "/products").is_err());
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ApiConfig::new("https://snacks.example.net/").unwrap();
        assert_eq!(
            config.endpoint("/products"),
            "https://snacks.example.net/products"
        );

        let config = ApiConfig::new("https://snacks.example.net/api/v1").unwrap();
        assert_eq!(
            config.endpoint("analyze-image"),
            "https://snacks.example.net/api/v1/analyze-image"
        );
    }

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::new("http://localhost:8000").unwrap();
        assert_eq!(config.upload_timeout, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.skip_tunnel_warning);
        assert_eq!(config.placeholder_images, 9);
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u16>("KIOSK_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("KIOSK_PORT"));
    }

    #[test]
    fn test_socket_addr() {
        let config = KioskConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            api: ApiConfig::new("http://localhost:8000").unwrap(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sentry: SentryConfig::default(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
