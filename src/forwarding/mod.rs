//! Forwarding engine.
//!
//! # Data Flow
//! ```text
//! inbound request (axum)
//!     → context.rs (RequestContext + InboundBody)
//!     → orchestrator.rs (per-call state machine)
//!         → hooks.rs (intercept?)
//!         → target.rs (resolve once)
//!         → builder.rs (outbound request, headers.rs)
//!         → hooks.rs (transform request)
//!         → dispatcher.rs (send via client.rs)
//!         → hooks.rs (transform response | failure handler)
//!     → relay.rs (stream back to the caller)
//! ```
//!
//! # Design Decisions
//! - `ProxyConfiguration` is immutable and shared behind an `Arc`
//! - One pooled client per configuration, shared by all of its calls
//! - The inbound body is moved through the pipeline, never buffered

pub mod builder;
pub mod client;
pub mod configuration;
pub mod context;
pub mod dispatcher;
pub mod headers;
pub mod hooks;
pub mod multipart;
pub mod orchestrator;
pub mod relay;
pub mod response;
pub mod target;

pub use builder::OutboundRequest;
pub use client::{ClientHandle, ClientSettings, HttpClient};
pub use configuration::{ForwardingOptions, ProxyConfiguration, ProxyConfigurationBuilder};
pub use context::{InboundBody, RequestContext, RouteArgs};
pub use dispatcher::{DispatchFailure, FailureKind, RequestHead};
pub use hooks::HookKind;
pub use orchestrator::{Forwarder, Phase};
pub use response::ProxyResponse;
pub use target::{Target, TargetResolver, TargetTemplate};
