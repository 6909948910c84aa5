//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! forwarding::orchestrator, http::server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the inbound request to the upstream one
//! - Metrics are cheap (atomic increments); without an installed recorder
//!   they are no-ops

pub mod logging;
pub mod metrics;
