//! Per-call inbound request descriptor.
//!
//! # Responsibilities
//! - Hold the inbound method, URI, headers and captured route arguments
//! - Carry the remote peer and request id for forwarded headers and logs
//! - Keep the body apart as a linear value so it can only be consumed once
//!
//! # Design Decisions
//! - `RequestContext` holds no body, so hooks can borrow it for the whole call
//! - `InboundBody` is not `Clone`; moving it into the outbound request is the
//!   only way to read it

use axum::body::Body;
use hyper::body::Body as HttpBody;
use hyper::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Uri};
use std::net::SocketAddr;

/// Route arguments captured by the host router, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteArgs(Vec<(String, String)>);

impl RouteArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the named argument, if captured.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Everything known about an inbound call except its body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route_args: RouteArgs,
    remote_addr: Option<SocketAddr>,
    request_id: String,
}

impl RequestContext {
    /// Create a context; the request id is generated and may be overridden.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            route_args: RouteArgs::default(),
            remote_addr: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_route_args(mut self, args: RouteArgs) -> Self {
        self.route_args = args;
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn route_args(&self) -> &RouteArgs {
        &self.route_args
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Declared content type, byte-for-byte as the client sent it.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Declared content length; not trusted for framing.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Single-consumption inbound body stream.
#[derive(Debug)]
pub struct InboundBody(Body);

impl InboundBody {
    pub fn new(body: Body) -> Self {
        Self(body)
    }

    pub fn empty() -> Self {
        Self(Body::empty())
    }

    /// Exact byte length when the stream knows it up front.
    pub fn exact_len(&self) -> Option<u64> {
        self.0.size_hint().exact()
    }

    pub(crate) fn into_body(self) -> Body {
        self.0
    }
}

impl From<Body> for InboundBody {
    fn from(body: Body) -> Self {
        Self(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_args_lookup() {
        let args: RouteArgs = vec![("id", "42"), ("rest", "a/b")].into_iter().collect();
        assert_eq!(args.get("id"), Some("42"));
        assert_eq!(args.get("rest"), Some("a/b"));
        assert_eq!(args.get("missing"), None);
        assert_eq!(args.len(), 2);
        let order: Vec<_> = args.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["id", "rest"]);
    }

    #[test]
    fn test_declared_body_metadata() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/xcustom".parse().unwrap());
        headers.insert(CONTENT_LENGTH, "11".parse().unwrap());
        let ctx = RequestContext::new(Method::POST, "/echo?x=1".parse().unwrap(), headers);

        assert_eq!(ctx.content_type(), Some("application/xcustom"));
        assert_eq!(ctx.content_length(), Some(11));
        assert_eq!(ctx.path(), "/echo");
        assert_eq!(ctx.query(), Some("x=1"));
        assert!(!ctx.request_id().is_empty());
    }

    #[test]
    fn test_inbound_body_length() {
        let body = InboundBody::new(Body::from("hello world"));
        assert_eq!(body.exact_len(), Some(11));
        assert_eq!(InboundBody::empty().exact_len(), Some(0));
    }
}
