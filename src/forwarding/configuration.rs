//! Immutable per-route proxy configuration.
//!
//! # Responsibilities
//! - Bundle the target resolver, the upstream client, the hooks and the
//!   forwarding options of one route
//! - Validate everything that can be validated before the first call
//!
//! # Design Decisions
//! - The configuration is frozen by `build()` and shared behind an `Arc`;
//!   nothing on it can change after route registration
//! - Exactly one `ClientHandle` is created per configuration

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, HookError};
use crate::forwarding::builder::OutboundRequest;
use crate::forwarding::client::{ClientHandle, ClientSettings};
use crate::forwarding::context::RequestContext;
use crate::forwarding::dispatcher::DispatchFailure;
use crate::forwarding::hooks::HookChain;
use crate::forwarding::response::ProxyResponse;
use crate::forwarding::target::{Target, TargetResolver};

/// Request-shaping switches applied by the outbound builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingOptions {
    /// Carry the inbound query string when the target has none.
    pub forward_query: bool,
    /// Append `X-Forwarded-For`, `X-Forwarded-Proto` and `X-Forwarded-Host`.
    pub add_forwarded_headers: bool,
}

impl Default for ForwardingOptions {
    fn default() -> Self {
        Self {
            forward_query: true,
            add_forwarded_headers: true,
        }
    }
}

/// Everything a route needs to forward a call.
#[derive(Debug)]
pub struct ProxyConfiguration {
    target: TargetResolver,
    client: ClientHandle,
    hooks: HookChain,
    options: ForwardingOptions,
}

impl ProxyConfiguration {
    pub fn builder(target: impl Into<TargetResolver>) -> ProxyConfigurationBuilder {
        ProxyConfigurationBuilder::new(target.into())
    }

    pub fn target(&self) -> &TargetResolver {
        &self.target
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    pub fn options(&self) -> &ForwardingOptions {
        &self.options
    }
}

/// Builder for [`ProxyConfiguration`].
pub struct ProxyConfigurationBuilder {
    target: TargetResolver,
    settings: ClientSettings,
    base_address: Option<String>,
    client: Option<ClientHandle>,
    hooks: HookChain,
    options: ForwardingOptions,
}

impl ProxyConfigurationBuilder {
    fn new(target: TargetResolver) -> Self {
        Self {
            target,
            settings: ClientSettings::default(),
            base_address: None,
            client: None,
            hooks: HookChain::default(),
            options: ForwardingOptions::default(),
        }
    }

    pub fn target(mut self, target: impl Into<TargetResolver>) -> Self {
        self.target = target.into();
        self
    }

    /// Round-trip limit for the engine-built client. `None` disables it.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Connection settings for the engine-built client.
    pub fn client_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Address relative targets are joined onto.
    pub fn base_address(mut self, base: impl Into<String>) -> Self {
        self.base_address = Some(base.into());
        self
    }

    /// Use a caller-built client as-is. A bare `HttpClient` gets no timeout
    /// and no base address; set them on a `ClientHandle` instead. The
    /// builder's own timeout and base address are ignored either way.
    pub fn client(mut self, client: impl Into<ClientHandle>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_intercept<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<Option<ProxyResponse>, HookError>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.set_intercept(Arc::new(hook));
        self
    }

    pub fn with_transform_request<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext, OutboundRequest) -> BoxFuture<'a, Result<OutboundRequest, HookError>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.set_transform_request(Arc::new(hook));
        self
    }

    pub fn with_transform_response<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext, ProxyResponse) -> BoxFuture<'a, Result<ProxyResponse, HookError>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.set_transform_response(Arc::new(hook));
        self
    }

    pub fn with_failure_handler<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a RequestContext, DispatchFailure) -> BoxFuture<'a, Result<ProxyResponse, HookError>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.set_failure_handler(Arc::new(hook));
        self
    }

    pub fn forward_query(mut self, enabled: bool) -> Self {
        self.options.forward_query = enabled;
        self
    }

    pub fn add_forwarded_headers(mut self, enabled: bool) -> Self {
        self.options.add_forwarded_headers = enabled;
        self
    }

    /// Freeze the configuration and create its client.
    pub fn build(self) -> Result<ProxyConfiguration, ConfigurationError> {
        let client = match self.client {
            Some(handle) => {
                if self.base_address.is_some() {
                    tracing::debug!("Base address ignored for caller-supplied client");
                }
                handle
            }
            None => {
                let base = self
                    .base_address
                    .as_deref()
                    .map(|raw| {
                        Url::parse(raw).map_err(|source| ConfigurationError::InvalidBaseAddress {
                            url: raw.to_string(),
                            source,
                        })
                    })
                    .transpose()?;
                let settings = ClientSettings {
                    base_address: base,
                    ..self.settings
                };
                ClientHandle::new(&settings)?
            }
        };

        if let TargetResolver::Static(raw) = &self.target {
            Target::resolve(raw, client.base_address())?;
        }

        Ok(ProxyConfiguration {
            target: self.target,
            client,
            hooks: self.hooks,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TargetResolutionError;
    use crate::forwarding::dispatcher::FailureKind;
    use axum::body::Body;
    use futures_util::FutureExt;
    use hyper::header::HeaderMap;
    use hyper::{Method, StatusCode};

    #[tokio::test]
    async fn test_defaults() {
        let config = ProxyConfiguration::builder("http://127.0.0.1:9/echo")
            .build()
            .unwrap();
        assert_eq!(config.options(), &ForwardingOptions::default());
        assert_eq!(config.client().timeout(), Some(Duration::from_secs(30)));
        assert!(!config.hooks().has_intercept());
        assert!(!config.hooks().has_failure_handler());
    }

    #[tokio::test]
    async fn test_relative_static_target_needs_base() {
        let err = ProxyConfiguration::builder("posts/1").build().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidTarget(TargetResolutionError::InvalidUrl { .. })
        ));

        let config = ProxyConfiguration::builder("posts/1")
            .base_address("http://127.0.0.1:9/api/")
            .build()
            .unwrap();
        assert_eq!(config.client().base_address().unwrap().as_str(), "http://127.0.0.1:9/api/");
    }

    #[tokio::test]
    async fn test_invalid_base_address() {
        let err = ProxyConfiguration::builder("/x")
            .base_address("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidBaseAddress { .. }));
    }

    #[tokio::test]
    async fn test_caller_client_ignores_timeout() {
        let engine = ClientHandle::new(&ClientSettings::default()).unwrap();
        let config = ProxyConfiguration::builder("http://127.0.0.1:9/")
            .timeout(Some(Duration::from_millis(10)))
            .client(engine.client().clone())
            .build()
            .unwrap();
        assert!(config.client().timeout().is_none());
    }

    #[tokio::test]
    async fn test_caller_handle_keeps_its_timeout() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let built = ClientHandle::new(&ClientSettings {
            timeout: None,
            ..ClientSettings::default()
        })
        .unwrap();
        let handle = ClientHandle::from_client(built.client().clone())
            .with_timeout(Some(Duration::from_millis(100)));
        let config = ProxyConfiguration::builder(format!("http://{addr}/hang"))
            .timeout(Some(Duration::from_secs(30)))
            .client(handle)
            .build()
            .unwrap();
        assert_eq!(config.client().timeout(), Some(Duration::from_millis(100)));

        let request = OutboundRequest {
            method: Method::GET,
            uri: format!("http://{addr}/hang").parse().unwrap(),
            headers: HeaderMap::new(),
            body: Body::empty(),
        };
        let failure = config.client().dispatch(request).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_caller_handle_base_address_joins_relative_target() {
        let built = ClientHandle::new(&ClientSettings::default()).unwrap();
        let handle = ClientHandle::from_client(built.client().clone())
            .with_base_address(Some(Url::parse("http://127.0.0.1:9/api/").unwrap()));
        let config = ProxyConfiguration::builder("posts/1")
            .client(handle)
            .build()
            .unwrap();
        assert_eq!(
            config.client().base_address().map(Url::as_str),
            Some("http://127.0.0.1:9/api/")
        );
    }

    #[tokio::test]
    async fn test_hooks_registered() {
        let config = ProxyConfiguration::builder("http://127.0.0.1:9/")
            .with_intercept(|_ctx| async { Ok(None) }.boxed())
            .with_failure_handler(|_ctx, _failure| {
                async { Ok(ProxyResponse::new(StatusCode::FORBIDDEN)) }.boxed()
            })
            .forward_query(false)
            .build()
            .unwrap();
        assert!(config.hooks().has_intercept());
        assert!(config.hooks().has_failure_handler());
        assert!(!config.options().forward_query);
    }
}
