//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with one proxied route per configured route
//! - Build one `ProxyConfiguration` (and so one upstream client) per route
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener and drain on shutdown

use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ProxyConfig, RouteConfig};
use crate::error::ConfigurationError;
use crate::forwarding::configuration::ProxyConfiguration;
use crate::forwarding::orchestrator::Forwarder;
use crate::forwarding::target::{TargetResolver, TargetTemplate};
use crate::http::route::ProxyRouterExt;
use crate::lifecycle::shutdown;

/// A configured route could not be turned into a proxy configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("route `{name}`: {source}")]
    Route {
        name: String,
        #[source]
        source: ConfigurationError,
    },
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let router = Self::build_router(&config)?;
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig) -> Result<Router, ServerError> {
        let mut router = Router::new();

        for route in &config.routes {
            let configuration =
                route_configuration(config, route).map_err(|source| ServerError::Route {
                    name: route.name.clone(),
                    source,
                })?;
            tracing::info!(
                route = %route.name,
                path = %route.path,
                upstream = %route.target,
                "Route configured"
            );
            router = router.proxy_with(&route.path, Forwarder::named(route.name.as_str(), configuration));
        }

        Ok(router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        ))
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Runtime configuration for one configured route.
fn route_configuration(
    config: &ProxyConfig,
    route: &RouteConfig,
) -> Result<ProxyConfiguration, ConfigurationError> {
    let template = TargetTemplate::parse(route.target.as_str())?;
    let resolver = if template.params().is_empty() {
        TargetResolver::fixed(route.target.as_str())
    } else {
        TargetResolver::from(template)
    };

    let mut builder = ProxyConfiguration::builder(resolver)
        .client_settings(config.client.settings_for(route))
        .forward_query(route.forward_query)
        .add_forwarded_headers(route.add_forwarded_headers);
    if let Some(base) = &route.base_address {
        builder = builder.base_address(base.as_str());
    }
    builder.build()
}
