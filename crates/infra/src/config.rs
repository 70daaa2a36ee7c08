//! Configuration loading and representation.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub storefront_url: String,
    pub checkout_base_url: String,
    pub payments_webhook_secret: Option<String>,
    pub order_stream_interval: Duration,
    pub low_stock_threshold: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            use_persistent_stores: false,
            database_url: None,
            storefront_url: "http://localhost:3001".to_string(),
            checkout_base_url: "https://checkout.example.com/pay".to_string(),
            payments_webhook_secret: None,
            order_stream_interval: Duration::from_secs(5),
            low_stock_threshold: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(v) => v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(v) => v,
            None => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                defaults.jwt_secret
            }
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
            None => false,
        };

        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let interval_secs = match get("ORDER_STREAM_INTERVAL_SECS") {
            Some(v) => parse_positive("ORDER_STREAM_INTERVAL_SECS", &v)?,
            None => defaults.order_stream_interval.as_secs(),
        };

        let low_stock_threshold = match get("LOW_STOCK_THRESHOLD") {
            Some(v) => v.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                name: "LOW_STOCK_THRESHOLD",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.low_stock_threshold,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            use_persistent_stores,
            database_url,
            storefront_url: get("STOREFRONT_URL").unwrap_or(defaults.storefront_url),
            checkout_base_url: get("CHECKOUT_BASE_URL").unwrap_or(defaults.checkout_base_url),
            payments_webhook_secret: get("PAYMENTS_WEBHOOK_SECRET"),
            order_stream_interval: Duration::from_secs(interval_secs),
            low_stock_threshold,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be positive".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = load(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("ORDER_STREAM_INTERVAL_SECS", "2"),
            ("LOW_STOCK_THRESHOLD", "10"),
            ("PAYMENTS_WEBHOOK_SECRET", "whsec"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.order_stream_interval, Duration::from_secs(2));
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.payments_webhook_secret.as_deref(), Some("whsec"));
    }

    #[test]
    fn persistent_mode_requires_database_url() {
        assert_eq!(
            load(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let config = load(&[
            ("USE_PERSISTENT_STORES", "1"),
            ("DATABASE_URL", "postgres://localhost/storedesk"),
        ])
        .unwrap();
        assert!(config.use_persistent_stores);
    }

    #[test]
    fn malformed_values_are_reported() {
        assert!(matches!(
            load(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { name: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            load(&[("ORDER_STREAM_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { name: "ORDER_STREAM_INTERVAL_SECS", .. })
        ));
        assert!(matches!(
            load(&[("USE_PERSISTENT_STORES", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
