//! Request descriptor.
//!
//! # Responsibilities
//! - Hold method, raw target and protocol as supplied by the connector
//! - Split the target once into a percent-decoded path and a raw query
//! - Track the base offset consumed by routers higher up the tree
//!
//! # Design Decisions
//! - Decoding happens once, at construction, never per segment
//! - A target that cannot be parsed keeps `path = None`; structural routes
//!   then score it 0.0 instead of failing
//! - The base only moves forward and never past the end of the path

use std::borrow::Cow;

use axum::http::Method;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::exchange::{Attributes, Protocol};

/// Inbound request half of an exchange.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    protocol: Option<Protocol>,
    scheme_protocol: Option<Protocol>,
    /// Percent-decoded path, `None` when the target was unparsable.
    path: Option<String>,
    query: Option<String>,
    /// Byte offset into `path` already consumed by parent routes.
    base: usize,
    attributes: Attributes,
    entity: Option<Bytes>,
}

impl Request {
    /// Create a request for an absolute or relative target URI.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let target = target.into();
        let parsed = split_target(&target);
        Self {
            method,
            target,
            protocol: None,
            scheme_protocol: parsed.protocol,
            path: parsed.path,
            query: parsed.query,
            base: 0,
            attributes: Attributes::new(),
            entity: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Set the protocol explicitly, overriding the one implied by the scheme.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<Bytes>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target exactly as supplied.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Explicit protocol, falling back to the target's scheme.
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol.or(self.scheme_protocol)
    }

    /// Full decoded path, ignoring the consumed base.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Part of the path already consumed by parent routes.
    pub fn base_path(&self) -> Option<&str> {
        self.path.as_deref().map(|p| &p[..self.base])
    }

    /// Decoded path left to match.
    pub fn remaining_path(&self) -> Option<&str> {
        self.path.as_deref().map(|p| &p[self.base..])
    }

    /// Remaining path, optionally followed by `?query`.
    pub fn remaining_part(&self, with_query: bool) -> Option<Cow<'_, str>> {
        let remaining = self.remaining_path()?;
        match (&self.query, with_query) {
            (Some(query), true) => Some(Cow::Owned(format!("{}?{}", remaining, query))),
            _ => Some(Cow::Borrowed(remaining)),
        }
    }

    /// Move the base forward by `consumed` bytes of the remaining part.
    pub(crate) fn advance_base(&mut self, consumed: usize) {
        if let Some(path) = &self.path {
            let mut next = (self.base + consumed).min(path.len());
            while !path.is_char_boundary(next) {
                next -= 1;
            }
            self.base = next;
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn entity(&self) -> Option<&Bytes> {
        self.entity.as_ref()
    }
}

struct ParsedTarget {
    protocol: Option<Protocol>,
    path: Option<String>,
    query: Option<String>,
}

fn split_target(target: &str) -> ParsedTarget {
    match Url::parse(target) {
        Ok(url) => ParsedTarget {
            protocol: Protocol::from_scheme(url.scheme()),
            path: decode(url.path()),
            query: url.query().map(str::to_string),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let without_fragment = target.split('#').next().unwrap_or_default();
            let (path, query) = match without_fragment.split_once('?') {
                Some((path, query)) => (path, Some(query.to_string())),
                None => (without_fragment, None),
            };
            ParsedTarget {
                protocol: None,
                path: decode(path),
                query,
            }
        }
        Err(e) => {
            tracing::debug!(target = %target, error = %e, "Unparsable request target");
            ParsedTarget {
                protocol: None,
                path: None,
                query: None,
            }
        }
    }
}

fn decode(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}
