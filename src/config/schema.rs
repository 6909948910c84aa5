//! Configuration schema definitions.
//!
//! This module defines the configuration file structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::forwarding::client::ClientSettings;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Upstream client settings shared by every route.
    pub client: ClientConfig,

    /// Route definitions, each forwarding to one target.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request timeout (full round trip) in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Idle pooled connection lifetime in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Idle pooled connections kept per upstream host.
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_idle_timeout_secs: 60,
            max_idle_per_host: 32,
        }
    }
}

impl ClientConfig {
    /// Client settings for a route, applying its timeout override.
    pub fn settings_for(&self, route: &RouteConfig) -> ClientSettings {
        let timeout_secs = route.timeout_secs.unwrap_or(self.request_timeout_secs);
        ClientSettings {
            timeout: Some(Duration::from_secs(timeout_secs)),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
            max_idle_per_host: self.max_idle_per_host,
            base_address: None,
        }
    }
}

/// A proxied route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Axum path pattern, with `{param}` and `{*rest}` captures.
    pub path: String,

    /// Target URL template; `{param}` placeholders are filled from captures.
    pub target: String,

    /// Address relative targets are joined onto.
    #[serde(default)]
    pub base_address: Option<String>,

    /// Overrides `client.request_timeout_secs` for this route.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Carry the inbound query string when the target has none.
    #[serde(default = "default_true")]
    pub forward_query: bool,

    /// Append `X-Forwarded-*` headers.
    #[serde(default = "default_true")]
    pub add_forwarded_headers: bool,
}

fn default_true() -> bool {
    true
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
