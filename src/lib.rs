//! Scored request routing and dispatch.
//!
//! Requests travel as an [`Exchange`](exchange::Exchange) through a tree of
//! [`Router`](routing::Router)s. Every route scores the exchange in `[0, 1]`;
//! the router picks a winner according to its routing mode and threshold,
//! binds template variables, and hands the exchange to the winner's target,
//! which may be another router. Outbound calls go through a
//! [`ClientRouter`](client::ClientRouter) that selects a client by protocol.

pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::AppConfig;
pub use error::{AttachError, DispatchError, HandlerFault};
pub use exchange::{Exchange, Request, Response};
pub use handler::{Handler, Target};
pub use http::HttpServer;
pub use lifecycle::{Dispatcher, Shutdown};
pub use routing::{Route, Router, RoutingMode};
