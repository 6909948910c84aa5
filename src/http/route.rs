//! Axum route registration for proxied paths.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::routing::any;
use axum::Router;
use hyper::{Request, Response};

use crate::forwarding::configuration::ProxyConfiguration;
use crate::forwarding::context::RouteArgs;
use crate::forwarding::orchestrator::Forwarder;
use crate::http::request::into_call;

/// Adds proxied routes to an axum `Router`.
pub trait ProxyRouterExt {
    /// Forward every method on `path` using `config`.
    fn proxy(self, path: &str, config: ProxyConfiguration) -> Self;

    /// Forward every method on `path` through an existing forwarder.
    fn proxy_with(self, path: &str, forwarder: Forwarder) -> Self;
}

impl<S> ProxyRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn proxy(self, path: &str, config: ProxyConfiguration) -> Self {
        self.proxy_with(path, Forwarder::named(path, config))
    }

    fn proxy_with(self, path: &str, forwarder: Forwarder) -> Self {
        tracing::debug!(path = %path, route = %forwarder.route(), "Registering proxy route");
        self.route(path, any(proxy_handler).with_state(forwarder))
    }
}

/// Axum handler forwarding one call.
pub async fn proxy_handler(
    State(forwarder): State<Forwarder>,
    params: Option<Path<Vec<(String, String)>>>,
    request: Request<Body>,
) -> Response<Body> {
    let args: RouteArgs = params
        .map(|Path(params)| params.into_iter().collect())
        .unwrap_or_default();
    let (ctx, body) = into_call(request, args);
    forwarder.forward(ctx, body).await
}
