//! Terminal handlers usable from configuration.

use axum::http::StatusCode;
use bytes::Bytes;
use serde::Serialize;

use crate::error::{DispatchError, HandlerFault};
use crate::exchange::{Attributes, Exchange};
use crate::handler::Handler;

/// Answers `200 OK` with a JSON description of the request, including
/// every variable bound along the route.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

#[derive(Serialize)]
struct EchoBody<'a> {
    method: &'a str,
    target: &'a str,
    remaining: Option<&'a str>,
    attributes: &'a Attributes,
}

impl Handler for Echo {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let request = &exchange.request;
        let body = EchoBody {
            method: request.method().as_str(),
            target: request.target(),
            remaining: request.remaining_path(),
            attributes: request.attributes(),
        };
        let json = serde_json::to_vec(&body)
            .map_err(|e| HandlerFault::with_source("failed to encode echo body", e))?;

        exchange.response.set_status(StatusCode::OK);
        exchange
            .response
            .attributes_mut()
            .insert("content-type", "application/json");
        exchange.response.set_entity(json);
        Ok(())
    }
}

/// Answers with a fixed status and body.
#[derive(Debug, Clone)]
pub struct Static {
    status: StatusCode,
    body: Bytes,
}

impl Static {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

impl Handler for Static {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        exchange.response.set_status(self.status);
        exchange.response.set_entity(self.body.clone());
        Ok(())
    }
}
