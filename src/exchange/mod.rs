//! Exchange subsystem.
//!
//! # Data Flow
//! ```text
//! Connector (raw I/O)
//!     → request.rs (method, target, protocol, attributes)
//!     → Exchange { request, response }
//!     → routing engine (scores, commits variables, dispatches)
//!     → terminal handler writes response.rs (status, attributes, entity)
//!     → Connector (serialises response)
//! ```
//!
//! # Design Decisions
//! - An exchange is owned by the dispatch call stack; routes never keep it
//! - Request and response each carry their own attribute bag
//! - Bodies are opaque bytes; nothing here inspects them

pub mod attributes;
pub mod protocol;
pub mod request;
pub mod response;

pub use attributes::Attributes;
pub use protocol::{Protocol, UnknownProtocol};
pub use request::Request;
pub use response::Response;

/// A request paired with the response being built for it.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    /// Wrap a request with a fresh `200 OK` response.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
        }
    }
}

impl From<Request> for Exchange {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}
