//! HTTP reverse-proxy forwarding engine for axum applications.

pub mod config;
pub mod error;
pub mod forwarding;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::{ConfigurationError, HookError, ProxyError, TargetResolutionError};
pub use forwarding::{
    DispatchFailure, FailureKind, Forwarder, InboundBody, OutboundRequest, ProxyConfiguration,
    ProxyResponse, RequestContext, RouteArgs, TargetResolver,
};
pub use http::{HttpServer, ProxyRouterExt};
pub use lifecycle::Shutdown;
