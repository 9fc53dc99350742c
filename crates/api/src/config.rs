//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use commerce::CommerceConfig;
use common::LocationId;
use domain::inventory::{DEFAULT_LOCATION_NAME, DEFAULT_LOW_STOCK_THRESHOLD};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: Postgres URL; unset runs on the in-memory store
/// - `DEFAULT_LOCATION_ID`: location debited by checkout; unset bootstraps
///   one named `DEFAULT_LOCATION_NAME`
/// - `DEFAULT_LOCATION_NAME` (default: `"Almacén Principal"`)
/// - `STORE_CURRENCY` (default: `"USD"`)
/// - `CART_TTL_DAYS` (default: `7`)
/// - `LOW_STOCK_THRESHOLD` (default: `10`)
/// - `CART_SWEEP_INTERVAL_SECS` (default: `3600`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub default_location_id: Option<LocationId>,
    pub default_location_name: String,
    pub currency: String,
    pub cart_ttl_days: i64,
    pub low_stock_threshold: i64,
    pub cart_sweep_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(lookup("PORT")).unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            default_location_id: lookup("DEFAULT_LOCATION_ID")
                .and_then(|id| uuid::Uuid::parse_str(id.trim()).ok())
                .map(LocationId::from_uuid),
            default_location_name: lookup("DEFAULT_LOCATION_NAME")
                .unwrap_or(defaults.default_location_name),
            currency: lookup("STORE_CURRENCY").unwrap_or(defaults.currency),
            cart_ttl_days: parse(lookup("CART_TTL_DAYS"))
                .filter(|days: &i64| *days > 0)
                .unwrap_or(defaults.cart_ttl_days),
            low_stock_threshold: parse(lookup("LOW_STOCK_THRESHOLD")).unwrap_or(defaults.low_stock_threshold),
            cart_sweep_interval: parse(lookup("CART_SWEEP_INTERVAL_SECS"))
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.cart_sweep_interval),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Service settings for the resolved default location.
    pub fn commerce(&self, default_location_id: LocationId) -> CommerceConfig {
        CommerceConfig::new(default_location_id)
            .with_currency(self.currency.clone())
            .with_cart_ttl(chrono::Duration::days(self.cart_ttl_days))
            .with_low_stock_threshold(self.low_stock_threshold)
    }
}

fn parse<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            default_location_id: None,
            default_location_name: DEFAULT_LOCATION_NAME.to_string(),
            currency: commerce::config::DEFAULT_CURRENCY.to_string(),
            cart_ttl_days: domain::cart::DEFAULT_CART_TTL_DAYS,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            cart_sweep_interval: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.default_location_name, "Almacén Principal");
        assert_eq!(config.currency, "USD");
        assert_eq!(config.cart_ttl_days, 7);
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.cart_sweep_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_reads_overrides() {
        let location = uuid::Uuid::new_v4();
        let location_str = location.to_string();
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DEFAULT_LOCATION_ID", &location_str),
            ("STORE_CURRENCY", "EUR"),
            ("CART_TTL_DAYS", "14"),
            ("LOW_STOCK_THRESHOLD", "3"),
            ("CART_SWEEP_INTERVAL_SECS", "60"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.default_location_id, Some(LocationId::from_uuid(location)));
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.cart_ttl_days, 14);
        assert_eq!(config.low_stock_threshold, 3);
        assert_eq!(config.cart_sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("CART_TTL_DAYS", "0"),
            ("DEFAULT_LOCATION_ID", "nope"),
            ("DATABASE_URL", ""),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cart_ttl_days, 7);
        assert_eq!(config.default_location_id, None);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_commerce_settings() {
        let location = LocationId::new();
        let config = from_pairs(&[("STORE_CURRENCY", "EUR"), ("CART_TTL_DAYS", "2")]);
        let commerce = config.commerce(location);
        assert_eq!(commerce.default_location_id, location);
        assert_eq!(commerce.currency, "EUR");
        assert_eq!(commerce.cart_ttl, chrono::Duration::days(2));
    }
}
