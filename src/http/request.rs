//! Inbound request conversion.
//!
//! # Responsibilities
//! - Split an axum request into a `RequestContext` and its `InboundBody`
//! - Pick up the request id set by `SetRequestIdLayer`
//! - Pick up the peer address when the server was started with connect info
//!
//! # Design Decisions
//! - The body is moved out untouched; nothing here reads it

use axum::body::Body;
use axum::extract::ConnectInfo;
use hyper::Request;
use std::net::SocketAddr;

use crate::forwarding::context::{InboundBody, RequestContext, RouteArgs};
use crate::forwarding::headers::X_REQUEST_ID;

/// Build the forwarding inputs for one inbound request.
pub fn into_call(request: Request<Body>, route_args: RouteArgs) -> (RequestContext, InboundBody) {
    let (parts, body) = request.into_parts();

    let request_id = parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let mut ctx =
        RequestContext::new(parts.method, parts.uri, parts.headers).with_route_args(route_args);
    if let Some(id) = request_id {
        ctx = ctx.with_request_id(id);
    }
    if let Some(addr) = remote_addr {
        ctx = ctx.with_remote_addr(addr);
    }

    (ctx, InboundBody::new(body))
}
