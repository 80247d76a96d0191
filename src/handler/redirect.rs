//! Redirection handler.
//!
//! # Responsibilities
//! - Build a new target URI by expanding a template from request attributes
//! - Either tell the caller to go there (3xx + location) or go there on the
//!   caller's behalf through the outbound client router
//!
//! # Design Decisions
//! - Template variables resolve from request attributes first, then from the
//!   built-ins `remaining` (remaining path and query) and `query`
//! - A missing client for the rewritten protocol is a handler fault, not a
//!   "no route" outcome: the inbound route did match

use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::ClientRouter;
use crate::error::{DispatchError, HandlerFault};
use crate::exchange::{Exchange, Request};
use crate::handler::Handler;
use crate::routing::Template;

/// How the rewritten target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectMode {
    /// 301 Moved Permanently.
    Permanent,
    /// 302 Found.
    Found,
    /// 303 See Other.
    SeeOther,
    /// 307 Temporary Redirect.
    Temporary,
    /// Dispatch through the outbound client router and relay the response.
    ServerOutbound,
}

impl RedirectMode {
    fn status(&self) -> Option<StatusCode> {
        match self {
            RedirectMode::Permanent => Some(StatusCode::MOVED_PERMANENTLY),
            RedirectMode::Found => Some(StatusCode::FOUND),
            RedirectMode::SeeOther => Some(StatusCode::SEE_OTHER),
            RedirectMode::Temporary => Some(StatusCode::TEMPORARY_REDIRECT),
            RedirectMode::ServerOutbound => None,
        }
    }
}

pub struct Redirector {
    template: Template,
    mode: RedirectMode,
    clients: Option<Arc<ClientRouter>>,
}

impl Redirector {
    /// Redirect the caller. `mode` must not be `ServerOutbound`; use
    /// [`Redirector::outbound`] for that.
    pub fn client(template: Template, mode: RedirectMode) -> Self {
        Self {
            template,
            mode,
            clients: None,
        }
    }

    /// Forward the exchange through `clients` to the rewritten target.
    pub fn outbound(template: Template, clients: Arc<ClientRouter>) -> Self {
        Self {
            template,
            mode: RedirectMode::ServerOutbound,
            clients: Some(clients),
        }
    }

    pub fn mode(&self) -> RedirectMode {
        self.mode
    }

    /// Expand the target template for this request.
    pub fn target_for(&self, request: &Request) -> Result<String, DispatchError> {
        self.template
            .expand(|name| {
                request.attributes().text(name).or_else(|| match name {
                    "remaining" => request.remaining_part(true).map(|r| r.into_owned()),
                    "query" => request.query().map(str::to_string),
                    _ => None,
                })
            })
            .map_err(|e| {
                HandlerFault::with_source(
                    format!("cannot build redirect target from '{}'", self.template),
                    e,
                )
                .into()
            })
    }

    fn forward(&self, target: String, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let clients = self
            .clients
            .as_ref()
            .ok_or_else(|| DispatchError::fault("outbound redirect has no client router"))?;

        let mut outbound = Request::new(exchange.request.method().clone(), target);
        if let Some(entity) = exchange.request.entity() {
            outbound = outbound.with_entity(entity.clone());
        }
        let mut outbound = Exchange::new(outbound);

        match clients.respond(&mut outbound) {
            Ok(()) => {
                exchange.response = outbound.response;
                Ok(())
            }
            Err(DispatchError::NoRouteMatched { .. }) => {
                let protocol = outbound
                    .request
                    .protocol()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(DispatchError::fault(format!(
                    "no outbound client available for protocol {}",
                    protocol
                )))
            }
            Err(fault) => Err(fault),
        }
    }
}

impl Handler for Redirector {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let target = self.target_for(&exchange.request)?;
        tracing::debug!(target = %target, mode = ?self.mode, "Redirecting");

        match self.mode.status() {
            Some(status) => {
                exchange.response.set_status(status);
                exchange.response.set_location(target);
                Ok(())
            }
            None => self.forward(target, exchange),
        }
    }
}
