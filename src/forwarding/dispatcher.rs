//! Upstream dispatch.
//!
//! # Responsibilities
//! - Send an `OutboundRequest` through a `ClientHandle`
//! - Enforce the handle's round-trip timeout
//! - Classify failures when no response could be obtained
//!
//! # Design Decisions
//! - Any upstream response is a success, whatever its status
//! - A timed-out dispatch is dropped, which cancels the in-flight exchange
//! - Failures keep the request head so failure handlers can inspect it

use hyper::header::HeaderMap;
use hyper::{Method, Uri};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use crate::error::{BoxError, HookError};
use crate::forwarding::builder::OutboundRequest;
use crate::forwarding::client::ClientHandle;
use crate::forwarding::hooks::HookKind;
use crate::forwarding::response::ProxyResponse;

/// Why no upstream response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection refused, DNS failure, TLS handshake failure.
    Connection,
    /// The round trip (or connect) exceeded its deadline.
    Timeout,
    /// The exchange broke after the connection was established.
    Protocol,
    /// A hook failed before or during dispatch.
    Hook,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Protocol => "protocol",
            Self::Hook => "hook",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method, URI and headers of an outbound request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// No response could be obtained from the target.
#[derive(Debug, Error)]
#[error("{kind} failure forwarding request: {source}")]
pub struct DispatchFailure {
    kind: FailureKind,
    #[source]
    source: BoxError,
    request: Option<RequestHead>,
}

impl DispatchFailure {
    pub fn new(kind: FailureKind, source: impl Into<BoxError>, request: Option<RequestHead>) -> Self {
        Self {
            kind,
            source: source.into(),
            request,
        }
    }

    /// A hook failure treated as a dispatch-equivalent failure.
    pub(crate) fn from_hook(hook: HookKind, error: HookError, request: Option<RequestHead>) -> Self {
        tracing::debug!(hook = %hook, error = %error, "Hook failure mapped to dispatch failure");
        Self::new(FailureKind::Hook, error, request)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Head of the outbound request, when one had been built.
    pub fn request(&self) -> Option<&RequestHead> {
        self.request.as_ref()
    }

    /// The underlying cause.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// True when any error in the chain is an I/O timeout.
fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn classify(err: &hyper_util::client::legacy::Error) -> FailureKind {
    if is_timeout(err) {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connection
    } else {
        FailureKind::Protocol
    }
}

impl ClientHandle {
    /// Send `request` and wait for the response head.
    pub async fn dispatch(&self, request: OutboundRequest) -> Result<ProxyResponse, DispatchFailure> {
        let head = request.head();
        let pending = self.client().request(request.into_http());

        let result = match self.timeout() {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(elapsed) => {
                    tracing::warn!(uri = %head.uri, timeout = ?limit, "Upstream timed out");
                    return Err(DispatchFailure::new(FailureKind::Timeout, elapsed, Some(head)));
                }
            },
            None => pending.await,
        };

        match result {
            Ok(response) => Ok(ProxyResponse::from_upstream(response)),
            Err(e) => {
                let kind = classify(&e);
                tracing::warn!(uri = %head.uri, kind = %kind, error = %e, "Upstream request failed");
                Err(DispatchFailure::new(kind, e, Some(head)))
            }
        }
    }
}
