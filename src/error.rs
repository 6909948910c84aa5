//! Error taxonomy for the forwarding engine.
//!
//! Every error defined here is converted into a response at the orchestrator
//! boundary; none of them crosses into the host framework.

use thiserror::Error;

use crate::forwarding::hooks::HookKind;

/// Boxed error accepted from caller-supplied code (resolvers, hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The target function failed or produced an unusable destination.
#[derive(Debug, Error)]
pub enum TargetResolutionError {
    /// The caller-supplied resolver returned an error.
    #[error("target resolver failed: {0}")]
    Resolver(#[source] BoxError),

    /// The resolved string is not a valid URL (even relative to the base address).
    #[error("invalid target url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL parsed but cannot be used as an HTTP request URI.
    #[error("target url `{url}` is not a valid request uri: {source}")]
    InvalidUri {
        url: String,
        #[source]
        source: hyper::http::uri::InvalidUri,
    },

    /// Only plain HTTP and HTTPS targets can be dispatched.
    #[error("unsupported target scheme `{0}`")]
    UnsupportedScheme(String),

    /// A target template has an unclosed or empty placeholder.
    #[error("invalid target template `{0}`")]
    InvalidTemplate(String),

    /// A target template references a route argument the route did not capture.
    #[error("missing route argument `{0}`")]
    MissingArgument(String),
}

/// Error raised from inside a caller-supplied hook.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl HookError {
    /// Create a hook error with a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Convert a caught panic payload into an error.
    pub(crate) fn panicked(hook: HookKind, payload: Box<dyn std::any::Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(format!("{hook} hook panicked: {detail}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while assembling a `ProxyConfiguration`.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The base address is not an absolute URL.
    #[error("invalid base address `{url}`: {source}")]
    InvalidBaseAddress {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A static target could not be resolved at build time.
    #[error("invalid static target: {0}")]
    InvalidTarget(#[from] TargetResolutionError),

    /// The TLS client configuration could not be created.
    #[error("failed to initialise TLS client: {0}")]
    Tls(#[from] rustls::Error),
}

/// Fatal errors of a single forwarding call.
///
/// These map to the generic fatal-error response rather than to the
/// failure handler.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    TargetResolution(#[from] TargetResolutionError),

    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: HookKind,
        #[source]
        source: HookError,
    },
}
