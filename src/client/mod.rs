//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! ClientSet (observed, changes at runtime)
//!     → ClientRouter::start (snapshot, one protocol route per client)
//!     → Router (protocol scores are binary)
//!     → Client::respond (file read, HTTP round trip, ...)
//! ```
//!
//! # Design Decisions
//! - Clients are handlers; the router never special-cases them
//! - The set is polled on (re)start only; there is no change callback

pub mod file;
pub mod http;
pub mod list;
pub mod router;

use std::sync::Arc;

use crate::exchange::Protocol;
use crate::handler::Handler;

pub use file::FileClient;
pub use http::HttpClient;
pub use list::ClientList;
pub use router::ClientRouter;

/// An outbound connector.
pub trait Client: Handler {
    /// Name used in logs and configuration.
    fn name(&self) -> &str;

    /// Protocols this client can carry.
    fn protocols(&self) -> &[Protocol];
}

/// A queryable, possibly changing set of outbound clients.
pub trait ClientSet: Send + Sync {
    fn available_clients(&self) -> Vec<Arc<dyn Client>>;
}
