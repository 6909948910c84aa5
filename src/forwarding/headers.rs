//! Header manipulation.
//!
//! # Responsibilities
//! - Copy end-to-end headers, keeping every value of repeated keys in order
//! - Strip hop-by-hop headers, including any named by `Connection`
//! - Append X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//!
//! # Design Decisions
//! - `Host` and `Content-Length` are never copied; both are recomputed
//! - Existing X-Forwarded-For chains are extended, never replaced
//! - Names arrive lowercased from `HeaderMap` and are sent that way; the
//!   axum server keeps no record of the client's original casing

use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};

use crate::forwarding::context::RequestContext;

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

static KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
static PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Returns true for headers that only describe a single transport hop.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == CONNECTION
        || name == TE
        || name == TRAILER
        || name == TRANSFER_ENCODING
        || name == UPGRADE
        || name == PROXY_AUTHENTICATE
        || name == PROXY_AUTHORIZATION
        || name == KEEP_ALIVE
        || name == PROXY_CONNECTION
}

/// Header names listed as connection options in `Connection`.
fn connection_options(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

/// Copy end-to-end request headers from `src` into `dst`.
///
/// Repeated keys become repeated entries in the original order.
pub fn copy_request_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    let options = connection_options(src);
    for (name, value) in src.iter() {
        if name == HOST || name == CONTENT_LENGTH || is_hop_by_hop(name) || options.contains(name)
        {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in connection_options(headers) {
        headers.remove(&name);
    }
    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(&name);
    }
}

/// Append the X-Forwarded-* family for `ctx` to outbound headers.
pub fn append_forwarded(headers: &mut HeaderMap, ctx: &RequestContext) {
    if let Some(addr) = ctx.remote_addr() {
        let mut chain: Vec<String> = headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        chain.push(addr.ip().to_string());
        if let Ok(value) = HeaderValue::from_str(&chain.join(", ")) {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_PROTO) {
        let proto = ctx.uri().scheme_str().unwrap_or("http");
        if let Ok(value) = HeaderValue::from_str(proto) {
            headers.insert(X_FORWARDED_PROTO.clone(), value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_HOST) {
        if let Some(host) = ctx.headers().get(HOST) {
            headers.insert(X_FORWARDED_HOST.clone(), host.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop(&CONNECTION));
        assert!(is_hop_by_hop(&TRANSFER_ENCODING));
        assert!(is_hop_by_hop(&KEEP_ALIVE));
        assert!(!is_hop_by_hop(&HeaderName::from_static("content-type")));
        assert!(!is_hop_by_hop(&HeaderName::from_static("x-custom")));
    }

    #[test]
    fn test_copy_keeps_repeated_values_in_order() {
        let mut src = HeaderMap::new();
        src.append("x-multi", HeaderValue::from_static("a"));
        src.append("x-multi", HeaderValue::from_static("b"));
        src.append("x-multi", HeaderValue::from_static("c"));
        src.insert(HOST, HeaderValue::from_static("proxy.local"));
        src.insert(CONTENT_LENGTH, HeaderValue::from_static("999"));
        src.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-session-hop"));
        src.insert("x-session-hop", HeaderValue::from_static("drop me"));
        src.insert("content-type", HeaderValue::from_static("multipart/form-data; boundary=AbC"));

        let mut dst = HeaderMap::new();
        copy_request_headers(&src, &mut dst);

        let values: Vec<_> = dst.get_all("x-multi").iter().collect();
        assert_eq!(values, ["a", "b", "c"]);
        assert_eq!(dst["content-type"], "multipart/form-data; boundary=AbC");
        assert!(!dst.contains_key(HOST));
        assert!(!dst.contains_key(CONTENT_LENGTH));
        assert!(!dst.contains_key(CONNECTION));
        assert!(!dst.contains_key("x-session-hop"));
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(CONNECTION, HeaderValue::from_static("x-trace-hop"));
        headers.insert("x-trace-hop", HeaderValue::from_static("1"));
        headers.insert("x-kept", HeaderValue::from_static("1"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("x-kept"));
    }

    #[test]
    fn test_forwarded_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("proxy.local:8080"));
        let ctx = RequestContext::new(Method::GET, "/a".parse().unwrap(), inbound)
            .with_remote_addr("10.0.0.7:5555".parse().unwrap());

        let mut outbound = HeaderMap::new();
        outbound.insert(X_FORWARDED_FOR.clone(), HeaderValue::from_static("203.0.113.9"));
        append_forwarded(&mut outbound, &ctx);

        assert_eq!(outbound[&X_FORWARDED_FOR], "203.0.113.9, 10.0.0.7");
        assert_eq!(outbound[&X_FORWARDED_PROTO], "http");
        assert_eq!(outbound[&X_FORWARDED_HOST], "proxy.local:8080");
    }
}
