//! Outbound request construction.
//!
//! # Responsibilities
//! - Turn a `RequestContext`, its body and a resolved `Target` into an
//!   absolute-form `OutboundRequest`
//! - Copy end-to-end headers verbatim (content type included, boundary and all)
//! - Recompute Content-Length from the body instead of trusting the client
//!
//! # Design Decisions
//! - The inbound body is moved, never buffered or cloned
//! - An unknown body length is sent chunked rather than guessed

use axum::body::Body;
use hyper::body::Body as HttpBody;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use hyper::{Method, Request, Uri};

use crate::error::TargetResolutionError;
use crate::forwarding::configuration::ForwardingOptions;
use crate::forwarding::context::{InboundBody, RequestContext};
use crate::forwarding::dispatcher::RequestHead;
use crate::forwarding::headers::{self, X_REQUEST_ID};
use crate::forwarding::multipart;
use crate::forwarding::target::Target;

/// The request about to be sent upstream.
///
/// Fields are public so a request-transform hook can rewrite any of them.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
}

impl OutboundRequest {
    /// Everything but the body, kept for failure diagnostics.
    pub fn head(&self) -> RequestHead {
        RequestHead {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Replace the body; Content-Length is re-synchronized before dispatch.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub(crate) fn into_http(self) -> Request<Body> {
        let mut request = Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        request
    }

    /// Make Content-Length agree with the body actually attached.
    pub(crate) fn sync_content_length(&mut self) {
        self.headers.remove(CONTENT_LENGTH);
        match self.body.size_hint().exact() {
            Some(0) if !carries_body(&self.method) => {}
            Some(len) => {
                self.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
            None => {}
        }
    }
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Build the outbound request for one call.
pub fn build_outbound(
    ctx: &RequestContext,
    body: InboundBody,
    target: &Target,
    options: &ForwardingOptions,
) -> Result<OutboundRequest, TargetResolutionError> {
    let target = match ctx.query() {
        Some(query) if options.forward_query && target.query().is_none() => {
            target.with_query(query)
        }
        _ => target.clone(),
    };

    let uri: Uri = target
        .url()
        .as_str()
        .parse()
        .map_err(|source| TargetResolutionError::InvalidUri {
            url: target.to_string(),
            source,
        })?;

    let mut headers = HeaderMap::with_capacity(ctx.headers().len() + 4);
    headers::copy_request_headers(ctx.headers(), &mut headers);
    if options.add_forwarded_headers {
        headers::append_forwarded(&mut headers, ctx);
    }
    if !headers.contains_key(&X_REQUEST_ID) {
        if let Ok(id) = HeaderValue::from_str(ctx.request_id()) {
            headers.insert(X_REQUEST_ID.clone(), id);
        }
    }

    if let Some(boundary) = ctx.content_type().and_then(multipart::boundary) {
        tracing::trace!(
            request_id = %ctx.request_id(),
            boundary = %boundary,
            "Relaying multipart body untouched"
        );
    }

    let mut request = OutboundRequest {
        method: ctx.method().clone(),
        uri,
        headers,
        body: body.into_body(),
    };
    request.sync_content_length();

    if let (Some(declared), Some(actual)) = (
        ctx.content_length(),
        request.body.size_hint().exact(),
    ) {
        if declared != actual {
            tracing::warn!(
                request_id = %ctx.request_id(),
                declared,
                actual,
                "Client Content-Length disagrees with body; using actual length"
            );
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{CONTENT_TYPE, HOST};

    fn options() -> ForwardingOptions {
        ForwardingOptions::default()
    }

    fn post(uri: &str, content_type: &str, declared_len: &str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
        headers.insert(CONTENT_LENGTH, declared_len.parse().unwrap());
        RequestContext::new(Method::POST, uri.parse().unwrap(), headers)
    }

    #[test]
    fn test_content_length_recomputed_from_body() {
        let ctx = post("/echo", "application/xcustom", "999");
        let target = Target::resolve("http://upstream:8080/echo", None).unwrap();
        let body = InboundBody::new(Body::from("hello world"));

        let request = build_outbound(&ctx, body, &target, &options()).unwrap();

        assert_eq!(request.headers[CONTENT_LENGTH], "11");
        assert_eq!(request.headers[CONTENT_TYPE], "application/xcustom");
        assert!(!request.headers.contains_key(HOST));
        assert_eq!(request.uri, "http://upstream:8080/echo");
    }

    #[test]
    fn test_multipart_content_type_untouched() {
        let content_type = "multipart/form-data; boundary=----Boundary7MA4YWxk";
        let ctx = post("/upload", content_type, "4");
        let target = Target::resolve("http://upstream/upload", None).unwrap();
        let request =
            build_outbound(&ctx, InboundBody::new(Body::from("abcd")), &target, &options())
                .unwrap();
        assert_eq!(request.headers[CONTENT_TYPE], content_type);
    }

    #[test]
    fn test_query_forwarding() {
        let ctx = RequestContext::new(Method::GET, "/search?q=rust&page=2".parse().unwrap(), HeaderMap::new());
        let bare = Target::resolve("http://upstream/find", None).unwrap();
        let request = build_outbound(&ctx, InboundBody::empty(), &bare, &options()).unwrap();
        assert_eq!(request.uri, "http://upstream/find?q=rust&page=2");
        assert!(!request.headers.contains_key(CONTENT_LENGTH));

        let ctx = RequestContext::new(Method::GET, "/search?q=rust".parse().unwrap(), HeaderMap::new());
        let with_query = Target::resolve("http://upstream/find?fixed=1", None).unwrap();
        let request = build_outbound(&ctx, InboundBody::empty(), &with_query, &options()).unwrap();
        assert_eq!(request.uri, "http://upstream/find?fixed=1");

        let no_forward = ForwardingOptions {
            forward_query: false,
            ..ForwardingOptions::default()
        };
        let request = build_outbound(&ctx, InboundBody::empty(), &bare, &no_forward).unwrap();
        assert_eq!(request.uri, "http://upstream/find");
    }

    #[test]
    fn test_request_id_and_forwarded_headers() {
        let ctx = RequestContext::new(Method::GET, "/".parse().unwrap(), HeaderMap::new())
            .with_request_id("req-123")
            .with_remote_addr("127.0.0.1:4000".parse().unwrap());
        let target = Target::resolve("http://upstream/", None).unwrap();

        let request = build_outbound(&ctx, InboundBody::empty(), &target, &options()).unwrap();
        assert_eq!(request.headers[&X_REQUEST_ID], "req-123");
        assert_eq!(request.headers["x-forwarded-for"], "127.0.0.1");

        let plain = ForwardingOptions {
            add_forwarded_headers: false,
            ..ForwardingOptions::default()
        };
        let request = build_outbound(&ctx, InboundBody::empty(), &target, &plain).unwrap();
        assert!(!request.headers.contains_key("x-forwarded-for"));
    }

    #[test]
    fn test_empty_post_declares_zero_length() {
        let ctx = post("/submit", "text/plain", "0");
        let target = Target::resolve("http://upstream/submit", None).unwrap();
        let request = build_outbound(&ctx, InboundBody::empty(), &target, &options()).unwrap();
        assert_eq!(request.headers[CONTENT_LENGTH], "0");
    }

    #[test]
    fn test_set_body_then_sync() {
        let ctx = post("/echo", "text/plain", "3");
        let target = Target::resolve("http://upstream/echo", None).unwrap();
        let mut request =
            build_outbound(&ctx, InboundBody::new(Body::from("abc")), &target, &options()).unwrap();
        request.set_body("a longer body");
        request.sync_content_length();
        assert_eq!(request.headers[CONTENT_LENGTH], "13");
    }
}
