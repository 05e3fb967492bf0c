use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

use crate::gateway::{DEFAULT_SQUARE_VERSION, SANDBOX_BASE_URL};

/// Service settings, read from `QWISHI_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub square_base_url: String,
    pub square_version: String,
    pub http_timeout: Duration,
    pub metrics_port: Option<u16>,
    /// `key=role:subject,...`; empty means open mode.
    pub api_keys: String,
    pub reaper_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            square_base_url: SANDBOX_BASE_URL.into(),
            square_version: DEFAULT_SQUARE_VERSION.into(),
            http_timeout: Duration::from_secs(30),
            metrics_port: None,
            api_keys: String::new(),
            reaper_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparsable numbers keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let http_timeout_secs = parse_or(&lookup, "QWISHI_HTTP_TIMEOUT_SECS", d.http_timeout.as_secs());
        let reaper_secs = parse_or(&lookup, "QWISHI_REAPER_INTERVAL_SECS", d.reaper_interval.as_secs());
        Self {
            bind: lookup("QWISHI_BIND").unwrap_or(d.bind),
            port: parse_or(&lookup, "QWISHI_PORT", d.port),
            square_base_url: lookup("QWISHI_SQUARE_BASE_URL").unwrap_or(d.square_base_url),
            square_version: lookup("QWISHI_SQUARE_VERSION").unwrap_or(d.square_version),
            http_timeout: Duration::from_secs(http_timeout_secs.max(1)),
            metrics_port: lookup("QWISHI_METRICS_PORT").and_then(|s| s.parse().ok()),
            api_keys: lookup("QWISHI_API_KEYS").unwrap_or_default(),
            reaper_interval: Duration::from_secs(reaper_secs.max(1)),
        }
    }

    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind, self.port).parse()
    }
}

fn parse_or<T: std::str::FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring unparsable {key}={raw}");
            default
        }),
    }
}
