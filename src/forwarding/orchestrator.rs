//! Per-call forwarding state machine.
//!
//! # Data Flow
//! ```text
//! Start → InterceptCheck ─┬─ Some(response) → Intercepted ──────────────────┐
//!                         └─ None → Build → Dispatch ─┬─ Success            │
//!                                                     │   → TransformResponse┤
//!                                                     └─ Failure            │
//!                                                         → HandleFailure ──┤
//!                                                                           ▼
//!                                                              Relay → Done
//! ```
//!
//! Any step may divert to `Fatal`, which relays the generic 500 response.
//!
//! # Design Decisions
//! - The state is an explicit enum stepped in a loop; every call ends in
//!   exactly one relayed response
//! - Hook errors before dispatch are failures of the call and reach the
//!   failure handler; errors after a response was obtained are fatal
//! - Nothing here returns an error to the host framework

use axum::body::Body;
use hyper::Response;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::error::{ProxyError, TargetResolutionError};
use crate::forwarding::builder::{build_outbound, OutboundRequest};
use crate::forwarding::configuration::ProxyConfiguration;
use crate::forwarding::context::{InboundBody, RequestContext};
use crate::forwarding::dispatcher::DispatchFailure;
use crate::forwarding::hooks::HookKind;
use crate::forwarding::relay::relay;
use crate::forwarding::response::ProxyResponse;
use crate::observability::metrics;

/// A step of the state machine, as recorded in a call trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    InterceptCheck,
    Intercepted,
    Build,
    Dispatch,
    Success,
    TransformResponse,
    Failure,
    HandleFailure,
    Fatal,
    Relay,
    Done,
}

enum CallState {
    Start,
    InterceptCheck,
    Intercepted(ProxyResponse),
    Build,
    Dispatch(OutboundRequest),
    Success(ProxyResponse),
    TransformResponse(ProxyResponse),
    Failure(DispatchFailure),
    HandleFailure(DispatchFailure),
    Fatal(ProxyError),
    Relay(ProxyResponse),
    Done(Response<Body>),
}

impl CallState {
    fn phase(&self) -> Phase {
        match self {
            Self::Start => Phase::Start,
            Self::InterceptCheck => Phase::InterceptCheck,
            Self::Intercepted(_) => Phase::Intercepted,
            Self::Build => Phase::Build,
            Self::Dispatch(_) => Phase::Dispatch,
            Self::Success(_) => Phase::Success,
            Self::TransformResponse(_) => Phase::TransformResponse,
            Self::Failure(_) => Phase::Failure,
            Self::HandleFailure(_) => Phase::HandleFailure,
            Self::Fatal(_) => Phase::Fatal,
            Self::Relay(_) => Phase::Relay,
            Self::Done(_) => Phase::Done,
        }
    }
}

/// How a call ended, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Forwarded,
    Intercepted,
    FailureHandled,
    BadGateway,
    Fatal,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Forwarded => "forwarded",
            Self::Intercepted => "intercepted",
            Self::FailureHandled => "failure_handled",
            Self::BadGateway => "bad_gateway",
            Self::Fatal => "fatal",
        }
    }
}

/// Where a build step stopped.
enum BuildError {
    Fatal(TargetResolutionError),
    Hook(DispatchFailure),
}

/// Forwards calls for one route.
///
/// Cheap to clone; clones share the configuration and its client.
#[derive(Clone)]
pub struct Forwarder {
    config: Arc<ProxyConfiguration>,
    route: Arc<str>,
}

impl fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarder")
            .field("route", &self.route)
            .field("config", &self.config)
            .finish()
    }
}

impl Forwarder {
    pub fn new(config: impl Into<Arc<ProxyConfiguration>>) -> Self {
        Self::named("default", config)
    }

    /// A forwarder whose logs and metrics carry `route`.
    pub fn named(route: impl Into<Arc<str>>, config: impl Into<Arc<ProxyConfiguration>>) -> Self {
        Self {
            config: config.into(),
            route: route.into(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn config(&self) -> &ProxyConfiguration {
        &self.config
    }

    /// Forward one call. Always yields a response.
    pub async fn forward(&self, ctx: RequestContext, body: InboundBody) -> Response<Body> {
        self.forward_traced(ctx, body).await.0
    }

    /// Forward one call and return the phases it went through.
    pub async fn forward_traced(
        &self,
        ctx: RequestContext,
        body: InboundBody,
    ) -> (Response<Body>, Vec<Phase>) {
        let span = tracing::debug_span!(
            "forward",
            route = %self.route,
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
        );
        self.run(ctx, body).instrument(span).await
    }

    async fn run(&self, ctx: RequestContext, body: InboundBody) -> (Response<Body>, Vec<Phase>) {
        let start = Instant::now();
        let hooks = self.config.hooks();
        let mut body = Some(body);
        let mut outcome = Outcome::Forwarded;
        let mut trace = Vec::with_capacity(8);
        let mut state = CallState::Start;

        loop {
            let phase = state.phase();
            trace.push(phase);
            tracing::trace!(phase = ?phase, "Call state");

            state = match state {
                CallState::Start => CallState::InterceptCheck,

                CallState::InterceptCheck => match hooks.intercept(&ctx).await {
                    Ok(Some(response)) => CallState::Intercepted(response),
                    Ok(None) => CallState::Build,
                    Err(e) => {
                        CallState::Failure(DispatchFailure::from_hook(HookKind::Intercept, e, None))
                    }
                },

                CallState::Intercepted(response) => {
                    tracing::debug!(status = %response.status, "Request intercepted");
                    outcome = Outcome::Intercepted;
                    CallState::Relay(response)
                }

                CallState::Build => {
                    let body = body.take().unwrap_or_else(InboundBody::empty);
                    match self.build(&ctx, body).await {
                        Ok(request) => CallState::Dispatch(request),
                        Err(BuildError::Fatal(e)) => CallState::Fatal(e.into()),
                        Err(BuildError::Hook(failure)) => CallState::Failure(failure),
                    }
                }

                CallState::Dispatch(request) => {
                    tracing::debug!(uri = %request.uri, "Dispatching");
                    match self.config.client().dispatch(request).await {
                        Ok(response) => CallState::Success(response),
                        Err(failure) => CallState::Failure(failure),
                    }
                }

                CallState::Success(response) => {
                    tracing::debug!(status = %response.status, "Upstream responded");
                    CallState::TransformResponse(response)
                }

                CallState::TransformResponse(response) => {
                    match hooks.transform_response(&ctx, response).await {
                        Ok(response) => CallState::Relay(response),
                        Err(source) => CallState::Fatal(ProxyError::Hook {
                            hook: HookKind::TransformResponse,
                            source,
                        }),
                    }
                }

                CallState::Failure(failure) => {
                    tracing::warn!(kind = %failure.kind(), error = %failure, "Forwarding failed");
                    metrics::record_dispatch_failure(&self.route, failure.kind().as_str());
                    CallState::HandleFailure(failure)
                }

                CallState::HandleFailure(failure) => {
                    outcome = if hooks.has_failure_handler() {
                        Outcome::FailureHandled
                    } else {
                        Outcome::BadGateway
                    };
                    match hooks.handle_failure(&ctx, failure).await {
                        Ok(response) => CallState::Relay(response),
                        Err(source) => CallState::Fatal(ProxyError::Hook {
                            hook: HookKind::FailureHandler,
                            source,
                        }),
                    }
                }

                CallState::Fatal(err) => {
                    tracing::error!(error = %err, "Call failed");
                    outcome = Outcome::Fatal;
                    CallState::Relay(ProxyResponse::fatal())
                }

                CallState::Relay(response) => CallState::Done(relay(response, ctx.method())),

                CallState::Done(response) => {
                    let status = response.status();
                    tracing::debug!(
                        status = %status,
                        outcome = outcome.as_str(),
                        elapsed = ?start.elapsed(),
                        "Call complete"
                    );
                    metrics::record_request(&self.route, outcome.as_str(), status.as_u16(), start);
                    return (response, trace);
                }
            };
        }
    }

    /// Resolve the target, build the outbound request and apply the
    /// request transform.
    async fn build(
        &self,
        ctx: &RequestContext,
        body: InboundBody,
    ) -> Result<OutboundRequest, BuildError> {
        let client = self.config.client();
        let target = self
            .config
            .target()
            .resolve(ctx, client.base_address())
            .await
            .map_err(BuildError::Fatal)?;

        let request =
            build_outbound(ctx, body, &target, self.config.options()).map_err(BuildError::Fatal)?;

        if !self.config.hooks().has_transform_request() {
            return Ok(request);
        }

        let head = request.head();
        let mut request = self
            .config
            .hooks()
            .transform_request(ctx, request)
            .await
            .map_err(|e| {
                BuildError::Hook(DispatchFailure::from_hook(HookKind::TransformRequest, e, Some(head)))
            })?;
        request.sync_content_length();
        Ok(request)
    }
}
