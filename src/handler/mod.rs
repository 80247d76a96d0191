//! Handler subsystem.
//!
//! # Data Flow
//! ```text
//! Router selects a route
//!     → Target (handler | router | client)
//!     → Handler::respond(&mut Exchange)
//!     → response half of the exchange is written
//! ```
//!
//! # Design Decisions
//! - `Handler` has one required method
//! - A route target is a shared reference, never a back-reference
//! - Routers and clients are distinct target variants; a router passed in
//!   as a plain handler still reports itself through `nested_router`, so
//!   attach sees it when checking for cycles

pub mod builtin;
pub mod redirect;

use std::fmt;
use std::sync::Arc;

use crate::client::Client;
use crate::error::DispatchError;
use crate::exchange::Exchange;
use crate::routing::Router;

pub use builtin::{Echo, Static};
pub use redirect::{RedirectMode, Redirector};

/// The unit of dispatch.
pub trait Handler: Send + Sync {
    /// Produce a response for the exchange.
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError>;

    /// The router this handler dispatches into, if it is one.
    fn nested_router(&self) -> Option<&Router> {
        None
    }
}

/// Adapts a closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Build a handler from a closure.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut Exchange) -> Result<(), DispatchError> + Send + Sync,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Exchange) -> Result<(), DispatchError> + Send + Sync,
{
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        (self.0)(exchange)
    }
}

/// What a route forwards to.
#[derive(Clone)]
pub enum Target {
    Handler(Arc<dyn Handler>),
    Router(Arc<Router>),
    Client(Arc<dyn Client>),
}

impl Target {
    pub fn handler(handler: impl Handler + 'static) -> Self {
        Target::Handler(Arc::new(handler))
    }

    /// Wrap an already shared handler.
    pub fn shared(handler: Arc<dyn Handler>) -> Self {
        Target::Handler(handler)
    }

    pub fn router(router: Arc<Router>) -> Self {
        Target::Router(router)
    }

    pub fn client(client: Arc<dyn Client>) -> Self {
        Target::Client(client)
    }

    pub fn as_router(&self) -> Option<&Arc<Router>> {
        match self {
            Target::Router(router) => Some(router),
            _ => None,
        }
    }

    /// True if both targets point at the same object.
    pub fn same_as(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Handler(a), Target::Handler(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Target::Router(a), Target::Router(b)) => Arc::ptr_eq(a, b),
            (Target::Client(a), Target::Client(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            Target::Handler(_) => "handler".to_string(),
            Target::Router(router) => format!("router:{}", router.name()),
            Target::Client(client) => format!("client:{}", client.name()),
        }
    }
}

impl Handler for Target {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        match self {
            Target::Handler(handler) => handler.respond(exchange),
            Target::Router(router) => router.respond(exchange),
            Target::Client(client) => client.respond(exchange),
        }
    }

    fn nested_router(&self) -> Option<&Router> {
        match self {
            Target::Handler(handler) => handler.nested_router(),
            Target::Router(router) => Some(router.as_ref()),
            Target::Client(_) => None,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&self.label()).finish()
    }
}
