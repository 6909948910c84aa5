//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0)
//! - Check that targets and base addresses parse and that every template
//!   placeholder is captured by the route path
//! - Detect duplicate route names and paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{ProxyConfig, RouteConfig};
use crate::forwarding::context::RouteArgs;
use crate::forwarding::target::TargetTemplate;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted location of the offending field, e.g. `routes[2].target`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.client.request_timeout_secs == 0 {
        errors.push(ValidationError::new("client.request_timeout_secs", "must be greater than 0"));
    }
    if config.client.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("client.connect_timeout_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        if !route.name.is_empty() && !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{i}].name"),
                format!("duplicate route name `{}`", route.name),
            ));
        }
        if !paths.insert(route.path.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{i}].path"),
                format!("duplicate route path `{}`", route.path),
            ));
        }
        validate_route(i, route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(i: usize, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let field = |name: &str| format!("routes[{i}].{name}");

    if route.name.trim().is_empty() {
        errors.push(ValidationError::new(field("name"), "must not be empty"));
    }
    if !route.path.starts_with('/') {
        errors.push(ValidationError::new(field("path"), "must start with `/`"));
    }
    if route.timeout_secs == Some(0) {
        errors.push(ValidationError::new(field("timeout_secs"), "must be greater than 0"));
    }

    let base = match &route.base_address {
        Some(raw) => match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                errors.push(ValidationError::new(field("base_address"), e.to_string()));
                None
            }
        },
        None => None,
    };

    let template = match TargetTemplate::parse(route.target.as_str()) {
        Ok(template) => template,
        Err(e) => {
            errors.push(ValidationError::new(field("target"), e.to_string()));
            return;
        }
    };

    let captured = path_params(&route.path);
    for param in template.params() {
        if !captured.iter().any(|c| c == param) {
            errors.push(ValidationError::new(
                field("target"),
                format!("placeholder `{param}` is not captured by path `{}`", route.path),
            ));
        }
    }

    // render with dummy segments to check the rest of the URL
    let sample: RouteArgs =
        template.params().iter().map(|p| (p.as_str(), "x")).collect();
    if let Ok(rendered) = template.render(&sample) {
        let parsed = match &base {
            Some(base) => base.join(&rendered),
            None => Url::parse(&rendered),
        };
        match parsed {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                field("target"),
                format!("unsupported scheme `{}`", url.scheme()),
            )),
            Err(_) if route.base_address.is_some() && base.is_none() => {}
            Err(e) => errors.push(ValidationError::new(
                field("target"),
                format!("`{}` is not a valid url: {e}", route.target),
            )),
        }
    }
}

/// Capture names of an axum path pattern.
fn path_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
        .map(|name| name.trim_start_matches('*').to_string())
        .collect()
}
