//! Response relay.
//!
//! Copies a `ProxyResponse` onto the axum response returned to the caller.
//! The body stream is moved across, never buffered, so chunked and multipart
//! bodies reach the caller byte-for-byte.

use axum::body::Body;
use hyper::body::Body as HttpBody;
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderValue, CONTENT_LENGTH};
use hyper::{Method, Response, StatusCode};

use crate::forwarding::headers;
use crate::forwarding::response::ProxyResponse;

/// Responses whose framing must not be derived from the body.
fn keeps_declared_length(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Turn the final `ProxyResponse` of a call into the host response.
pub fn relay(response: ProxyResponse, method: &Method) -> Response<Body> {
    let ProxyResponse {
        status,
        reason,
        mut headers,
        body,
    } = response;

    headers::strip_hop_by_hop(&mut headers);

    if !keeps_declared_length(method, status) {
        headers.remove(CONTENT_LENGTH);
        if let Some(len) = body.size_hint().exact() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
    }

    let mut out = Response::new(body);
    *out.status_mut() = status;
    *out.headers_mut() = headers;

    if let Some(reason) = reason.filter(|r| Some(r.as_str()) != status.canonical_reason()) {
        match ReasonPhrase::try_from(reason) {
            Ok(phrase) => {
                out.extensions_mut().insert(phrase);
            }
            Err(e) => {
                tracing::warn!(status = %status, error = %e, "Dropping invalid reason phrase");
            }
        }
    }

    out
}
