//! Outbound response mapping.
//!
//! # Design Decisions
//! - `NoRouteMatched` maps to 404, `HandlerFault` to 500; the fault message
//!   is logged, never sent to the caller
//! - The `location` and `content-type` response attributes become headers

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};

use crate::error::DispatchError;
use crate::exchange::Response;

/// Response attribute copied into the `content-type` header.
pub const CONTENT_TYPE_ATTRIBUTE: &str = "content-type";

pub fn into_http_response(mut response: Response, result: Result<(), DispatchError>) -> HttpResponse {
    match result {
        Ok(()) => {}
        Err(DispatchError::NoRouteMatched { .. }) => {
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        }
        Err(e @ DispatchError::HandlerFault(_)) => {
            tracing::error!(error = %e, "Handler fault");
            return (e.status_code(), "Internal error").into_response();
        }
    }

    let body = response.take_entity().map(Body::from).unwrap_or_else(Body::empty);
    let mut http = HttpResponse::new(body);
    *http.status_mut() = response.status();

    let headers = http.headers_mut();
    if let Some(location) = response.location().and_then(|l| HeaderValue::from_str(l).ok()) {
        headers.insert(header::LOCATION, location);
    }
    if let Some(content_type) = response
        .attributes()
        .get_str(CONTENT_TYPE_ATTRIBUTE)
        .and_then(|c| HeaderValue::from_str(c).ok())
    {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    http
}
