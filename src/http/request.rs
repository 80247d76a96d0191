//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the caller sent none
//! - Turn an HTTP request into an `Exchange` for the root router
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The exchange target is the origin-form path and query; the protocol is
//!   set explicitly since the connector knows it
//! - The request ID is exposed to handlers as the `request_id` attribute

use axum::http::{request::Parts, HeaderValue};
use bytes::Bytes;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::exchange::{Exchange, Protocol, Request};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Attribute key carrying the request ID.
pub const REQUEST_ID_ATTRIBUTE: &str = "request_id";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID from the headers, or `"unknown"`.
pub fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Build the exchange the root router sees.
pub fn to_exchange(parts: &Parts, body: Bytes, request_id: &str) -> Exchange {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut request = Request::new(parts.method.clone(), target).with_protocol(Protocol::Http);
    if !body.is_empty() {
        request = request.with_entity(body);
    }
    request
        .attributes_mut()
        .insert(REQUEST_ID_ATTRIBUTE, request_id.to_string());
    Exchange::new(request)
}
