//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Routers, clients, connector:
//!     → tracing events (route selection, attach/detach, reloads)
//!     → metrics.rs (dispatch outcomes, route counts, request latency)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, text or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows into every span the connector opens
//! - Metric calls are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
