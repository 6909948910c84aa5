//! HTTP integration subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID and trace layers)
//!     → route.rs (proxy_handler for the matched route)
//!     → request.rs (RequestContext + InboundBody)
//!     → forwarding::Forwarder
//!     → response streamed back to the client
//! ```

pub mod request;
pub mod route;
pub mod server;

pub use route::{proxy_handler, ProxyRouterExt};
pub use server::{HttpServer, ServerError};
