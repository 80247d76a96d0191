//! Error taxonomy for dispatch and attachment.
//!
//! Attach-time failures ([`AttachError`]) are detected before a route ever
//! sees traffic. Dispatch-time failures ([`DispatchError`]) keep "nothing
//! matched" apart from "the selected handler failed" so a connector can map
//! them to different status codes.

use std::error::Error as StdError;

use axum::http::StatusCode;
use thiserror::Error;

use crate::routing::template::TemplateError;

/// Outcome of a failed `respond` call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every candidate scored below the router's threshold.
    #[error("no route matched '{path}' in router '{router}'")]
    NoRouteMatched { router: String, path: String },

    /// The selected target failed while producing the response.
    #[error(transparent)]
    HandlerFault(#[from] HandlerFault),
}

impl DispatchError {
    /// Shorthand for a handler fault with a message only.
    pub fn fault(message: impl Into<String>) -> Self {
        DispatchError::HandlerFault(HandlerFault::new(message))
    }

    pub fn is_no_route(&self) -> bool {
        matches!(self, DispatchError::NoRouteMatched { .. })
    }

    pub fn is_handler_fault(&self) -> bool {
        matches!(self, DispatchError::HandlerFault(_))
    }

    /// Status a connector should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            DispatchError::HandlerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoRouteMatched { .. } => "no_route",
            DispatchError::HandlerFault(_) => "handler_fault",
        }
    }
}

/// A target handler failed internally.
#[derive(Debug, Error)]
#[error("handler fault: {message}")]
pub struct HandlerFault {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Rejection of an attach operation.
#[derive(Debug, Error)]
pub enum AttachError {
    /// A variable name appears more than once in one template.
    #[error("template '{template}' declares variable '{variable}' more than once")]
    AmbiguousTemplate { template: String, variable: String },

    /// The template could not be parsed or compiled.
    #[error("invalid template '{template}': {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: TemplateError,
    },

    /// The router would become its own descendant.
    #[error("attaching router '{child}' under '{parent}' would create a cycle")]
    CyclicAttachment { parent: String, child: String },
}

impl AttachError {
    pub(crate) fn from_template(template: &str, error: TemplateError) -> Self {
        match error {
            TemplateError::DuplicateVariable(variable) => AttachError::AmbiguousTemplate {
                template: template.to_string(),
                variable,
            },
            source => AttachError::InvalidTemplate {
                template: template.to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_distinguishable() {
        let missing = DispatchError::NoRouteMatched {
            router: "root".into(),
            path: "/nope".into(),
        };
        let fault = DispatchError::fault("disk on fire");

        assert!(missing.is_no_route());
        assert!(fault.is_handler_fault());
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(fault.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fault.to_string(), "handler fault: disk on fire");
    }

    #[test]
    fn test_duplicate_variable_maps_to_ambiguous() {
        let err = AttachError::from_template(
            "/{id}/{id}",
            TemplateError::DuplicateVariable("id".into()),
        );
        assert!(matches!(err, AttachError::AmbiguousTemplate { ref variable, .. } if variable == "id"));
    }
}
