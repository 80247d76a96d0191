//! Response descriptor.

use axum::http::StatusCode;
use bytes::Bytes;

use crate::exchange::Attributes;

/// Attribute key carrying a redirect location.
pub const LOCATION: &str = "location";

/// Mutable response half of an exchange.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    attributes: Attributes,
    entity: Option<Bytes>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            attributes: Attributes::new(),
            entity: None,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Opaque body produced by a terminal handler.
    pub fn entity(&self) -> Option<&Bytes> {
        self.entity.as_ref()
    }

    pub fn set_entity(&mut self, entity: impl Into<Bytes>) {
        self.entity = Some(entity.into());
    }

    pub fn take_entity(&mut self) -> Option<Bytes> {
        self.entity.take()
    }

    pub fn location(&self) -> Option<&str> {
        self.attributes.get_str(LOCATION)
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.attributes.insert(LOCATION, location.into());
    }
}
