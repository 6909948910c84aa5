//! Response descriptor shared by dispatch, hooks and relay.

use axum::body::Body;
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

const BAD_GATEWAY_BODY: &str = "Request could not be proxied.";
const FATAL_BODY: &str = "Request could not be completed.";

/// A response on its way back to the caller.
///
/// Produced by dispatch, by an intercept hook or by a failure handler.
/// Every field is public so a response-transform hook can rewrite it.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    /// Explicit reason phrase; `None` means the canonical one for `status`.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
}

impl ProxyResponse {
    /// An empty-bodied response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// A `text/plain` response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut response = Self::new(status).with_body(body.into());
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// The phrase that will appear on the status line.
    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    /// Default response for a dispatch failure with no failure handler.
    pub fn bad_gateway() -> Self {
        Self::text(StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY)
    }

    /// Response for errors that cannot be mapped by a hook.
    pub fn fatal() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, FATAL_BODY)
    }

    /// Take over an upstream response without touching its body.
    pub(crate) fn from_upstream(response: Response<Incoming>) -> Self {
        let (mut parts, body) = response.into_parts();
        // hyper only records a phrase that differs from the canonical one
        let reason = parts
            .extensions
            .remove::<ReasonPhrase>()
            .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned());
        Self {
            status: parts.status,
            reason,
            headers: parts.headers,
            body: Body::new(body),
        }
    }
}
