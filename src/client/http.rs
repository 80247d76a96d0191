//! Plain HTTP outbound client.
//!
//! # Design Decisions
//! - One pooled hyper-util client per `HttpClient`
//! - Handlers are synchronous, so each round trip blocks on the runtime
//!   handle; call `respond` from a blocking thread (`spawn_blocking` or a
//!   plain `std::thread`), never from inside an async task
//! - Only `http:` targets; TLS is not carried

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request as HttpRequest, StatusCode, Uri};
use bytes::Bytes;
use hyper_util::client::legacy::{connect::HttpConnector, Client as HyperClient};
use hyper_util::rt::TokioExecutor;
use tokio::runtime::Handle;

use crate::client::Client;
use crate::error::{DispatchError, HandlerFault};
use crate::exchange::{Exchange, Protocol};
use crate::handler::Handler;

const PROTOCOLS: [Protocol; 1] = [Protocol::Http];

/// Largest response body relayed back into the exchange.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct HttpClient {
    name: String,
    client: HyperClient<HttpConnector, Body>,
    handle: Handle,
    timeout: Duration,
}

struct Relayed {
    status: StatusCode,
    location: Option<String>,
    content_type: Option<String>,
    body: Bytes,
}

impl HttpClient {
    /// Build a client that drives its I/O on `handle`.
    pub fn new(name: impl Into<String>, handle: Handle, timeout: Duration) -> Self {
        let client = HyperClient::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            name: name.into(),
            client,
            handle,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_request(&self, exchange: &Exchange) -> Result<HttpRequest<Body>, DispatchError> {
        let uri: Uri = exchange.request.target().parse().map_err(|e| {
            HandlerFault::with_source(format!("invalid outbound target '{}'", exchange.request.target()), e)
        })?;
        let body = exchange
            .request
            .entity()
            .cloned()
            .map(Body::from)
            .unwrap_or_else(Body::empty);

        HttpRequest::builder()
            .method(exchange.request.method().clone())
            .uri(uri)
            .body(body)
            .map_err(|e| HandlerFault::with_source("cannot build outbound request", e).into())
    }

    async fn round_trip(
        client: HyperClient<HttpConnector, Body>,
        request: HttpRequest<Body>,
        timeout: Duration,
    ) -> Result<Relayed, HandlerFault> {
        let response = tokio::time::timeout(timeout, client.request(request))
            .await
            .map_err(|_| HandlerFault::new(format!("upstream timed out after {:?}", timeout)))?
            .map_err(|e| HandlerFault::with_source("upstream request failed", e))?;

        let status = response.status();
        let header_text = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let location = header_text(header::LOCATION);
        let content_type = header_text(header::CONTENT_TYPE);

        let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
            .await
            .map_err(|e| HandlerFault::with_source("cannot read upstream body", e))?;

        Ok(Relayed {
            status,
            location,
            content_type,
            body,
        })
    }
}

impl Handler for HttpClient {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let request = self.build_request(exchange)?;
        tracing::debug!(client = %self.name, target = %exchange.request.target(), "Forwarding upstream");

        let relayed = self
            .handle
            .block_on(Self::round_trip(self.client.clone(), request, self.timeout))?;

        let response = &mut exchange.response;
        response.set_status(relayed.status);
        if let Some(location) = relayed.location {
            response.set_location(location);
        }
        if let Some(content_type) = relayed.content_type {
            response.attributes_mut().insert("content-type", content_type);
        }
        response.set_entity(relayed.body);
        Ok(())
    }
}

impl Client for HttpClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocols(&self) -> &[Protocol] {
        &PROTOCOLS
    }
}
