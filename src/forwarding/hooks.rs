//! Hook chain.
//!
//! # Responsibilities
//! - Hold the four optional extension points of a proxy configuration
//! - Invoke each one with panic isolation
//!
//! # Design Decisions
//! - Hooks are `Arc`'d async functions, so a configuration clones cheaply
//!   and can be shared by every in-flight call
//! - A panicking hook is converted to a `HookError`; the caller always gets
//!   a response

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::HookError;
use crate::forwarding::builder::OutboundRequest;
use crate::forwarding::context::RequestContext;
use crate::forwarding::dispatcher::DispatchFailure;
use crate::forwarding::response::ProxyResponse;

/// Runs first; returning a response skips resolution and dispatch.
pub type InterceptFn = dyn for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<Option<ProxyResponse>, HookError>>
    + Send
    + Sync;

/// Rewrites the outbound request just before dispatch.
pub type TransformRequestFn = dyn for<'a> Fn(&'a RequestContext, OutboundRequest) -> BoxFuture<'a, Result<OutboundRequest, HookError>>
    + Send
    + Sync;

/// Rewrites any upstream response before relay.
pub type TransformResponseFn = dyn for<'a> Fn(&'a RequestContext, ProxyResponse) -> BoxFuture<'a, Result<ProxyResponse, HookError>>
    + Send
    + Sync;

/// Maps a dispatch failure to the response sent to the caller.
pub type FailureHandlerFn = dyn for<'a> Fn(&'a RequestContext, DispatchFailure) -> BoxFuture<'a, Result<ProxyResponse, HookError>>
    + Send
    + Sync;

/// Identifies a hook in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Intercept,
    TransformRequest,
    TransformResponse,
    FailureHandler,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Intercept => "intercept",
            Self::TransformRequest => "transform request",
            Self::TransformResponse => "transform response",
            Self::FailureHandler => "failure handler",
        })
    }
}

/// The optional hooks of one proxy configuration.
#[derive(Clone, Default)]
pub struct HookChain {
    intercept: Option<Arc<InterceptFn>>,
    transform_request: Option<Arc<TransformRequestFn>>,
    transform_response: Option<Arc<TransformResponseFn>>,
    failure_handler: Option<Arc<FailureHandlerFn>>,
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain")
            .field("intercept", &self.intercept.is_some())
            .field("transform_request", &self.transform_request.is_some())
            .field("transform_response", &self.transform_response.is_some())
            .field("failure_handler", &self.failure_handler.is_some())
            .finish()
    }
}

impl HookChain {
    pub(crate) fn set_intercept(&mut self, hook: Arc<InterceptFn>) {
        self.intercept = Some(hook);
    }

    pub(crate) fn set_transform_request(&mut self, hook: Arc<TransformRequestFn>) {
        self.transform_request = Some(hook);
    }

    pub(crate) fn set_transform_response(&mut self, hook: Arc<TransformResponseFn>) {
        self.transform_response = Some(hook);
    }

    pub(crate) fn set_failure_handler(&mut self, hook: Arc<FailureHandlerFn>) {
        self.failure_handler = Some(hook);
    }

    pub fn has_intercept(&self) -> bool {
        self.intercept.is_some()
    }

    pub fn has_transform_request(&self) -> bool {
        self.transform_request.is_some()
    }

    pub fn has_failure_handler(&self) -> bool {
        self.failure_handler.is_some()
    }

    pub(crate) async fn intercept(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<ProxyResponse>, HookError> {
        let Some(hook) = &self.intercept else {
            return Ok(None);
        };
        guarded(HookKind::Intercept, async { hook(ctx).await }).await
    }

    pub(crate) async fn transform_request(
        &self,
        ctx: &RequestContext,
        request: OutboundRequest,
    ) -> Result<OutboundRequest, HookError> {
        let Some(hook) = &self.transform_request else {
            return Ok(request);
        };
        guarded(HookKind::TransformRequest, async move { hook(ctx, request).await }).await
    }

    pub(crate) async fn transform_response(
        &self,
        ctx: &RequestContext,
        response: ProxyResponse,
    ) -> Result<ProxyResponse, HookError> {
        let Some(hook) = &self.transform_response else {
            return Ok(response);
        };
        guarded(HookKind::TransformResponse, async move { hook(ctx, response).await }).await
    }

    /// Map a failure; without a handler this is the fixed 502 response.
    pub(crate) async fn handle_failure(
        &self,
        ctx: &RequestContext,
        failure: DispatchFailure,
    ) -> Result<ProxyResponse, HookError> {
        let Some(hook) = &self.failure_handler else {
            return Ok(ProxyResponse::bad_gateway());
        };
        guarded(HookKind::FailureHandler, async move { hook(ctx, failure).await }).await
    }
}

async fn guarded<T, F>(kind: HookKind, fut: F) -> Result<T, HookError>
where
    F: std::future::Future<Output = Result<T, HookError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let err = HookError::panicked(kind, payload);
            tracing::error!(hook = %kind, error = %err, "Hook panicked");
            Err(err)
        }
    }
}
