//! Shared upstream client.
//!
//! # Responsibilities
//! - Build one pooled HTTP/HTTPS client per proxy configuration
//! - Carry the request timeout and base address that go with it
//! - Accept a caller-built client unchanged
//!
//! # Design Decisions
//! - `hyper-util`'s pooled client is cheap to clone; every clone shares one
//!   connection pool, so concurrent calls never contend on a lock here
//! - TLS uses rustls with the ring provider and bundled webpki roots
//! - A caller-supplied client gets no timeout and no base address unless the
//!   caller adds them with `with_timeout` / `with_base_address`

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::time::Duration;
use url::Url;

/// Upstream client type used by the engine.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Settings for an engine-built client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Round-trip limit; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub max_idle_per_host: usize,
    /// Relative targets are joined onto this address.
    pub base_address: Option<Url>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(5),
            pool_idle_timeout: Duration::from_secs(60),
            max_idle_per_host: 32,
            base_address: None,
        }
    }
}

/// A long-lived client bound to one proxy configuration.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    client: HttpClient,
    timeout: Option<Duration>,
    base_address: Option<Url>,
}

impl ClientHandle {
    /// Build a pooled client from settings.
    pub fn new(settings: &ClientSettings) -> Result<Self, rustls::Error> {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(settings.connect_timeout));
        http.set_nodelay(true);
        http.enforce_http(false);

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(settings.pool_idle_timeout)
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .build(https);

        tracing::debug!(
            timeout = ?settings.timeout,
            connect_timeout = ?settings.connect_timeout,
            max_idle_per_host = settings.max_idle_per_host,
            base_address = ?settings.base_address.as_ref().map(Url::as_str),
            "Upstream client configured"
        );

        Ok(Self {
            client,
            timeout: settings.timeout,
            base_address: settings.base_address.clone(),
        })
    }

    /// Wrap a caller-built client as-is.
    pub fn from_client(client: HttpClient) -> Self {
        Self {
            client,
            timeout: None,
            base_address: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_address(mut self, base: Option<Url>) -> Self {
        self.base_address = base;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn base_address(&self) -> Option<&Url> {
        self.base_address.as_ref()
    }

    pub(crate) fn client(&self) -> &HttpClient {
        &self.client
    }
}

impl From<HttpClient> for ClientHandle {
    fn from(client: HttpClient) -> Self {
        Self::from_client(client)
    }
}
