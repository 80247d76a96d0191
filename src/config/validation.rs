//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every template and redirect target parses
//! - Validate value ranges (thresholds in [0, 1], status codes, addresses)
//! - Detect duplicate route and client names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::schema::{AppConfig, RouteConfig, TargetConfig};
use crate::handler::RedirectMode;
use crate::routing::{RouterSettings, Template};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{scope}: threshold {value} is outside [0, 1]")]
    ThresholdOutOfRange { scope: String, value: f32 },

    #[error("{route}: invalid template '{template}': {reason}")]
    InvalidTemplate {
        route: String,
        template: String,
        reason: String,
    },

    #[error("{route}: invalid redirect target '{target}': {reason}")]
    InvalidRedirectTarget {
        route: String,
        target: String,
        reason: String,
    },

    #[error("{route}: server_outbound redirect needs at least one client")]
    OutboundWithoutClients { route: String },

    #[error("{route}: invalid status code {status}")]
    InvalidStatus { route: String, status: u16 },

    #[error("{scope}: duplicate route name '{name}'")]
    DuplicateRouteName { scope: String, name: String },

    #[error("duplicate client name '{0}'")]
    DuplicateClientName(String),

    #[error("{scope}: route name must not be empty")]
    EmptyRouteName { scope: String },

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Check a whole configuration, collecting every problem.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let mut client_names = HashSet::new();
    for client in &config.clients {
        if !client_names.insert(client.name()) {
            errors.push(ValidationError::DuplicateClientName(client.name().to_string()));
        }
    }

    let ctx = Context {
        has_clients: !config.clients.is_empty(),
    };
    ctx.check_router("root", &config.router, &config.routes, &mut errors);
    if let Some(default) = &config.default {
        ctx.check_target("root.default", default, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

struct Context {
    has_clients: bool,
}

impl Context {
    fn check_router(
        &self,
        scope: &str,
        settings: &RouterSettings,
        routes: &[RouteConfig],
        errors: &mut Vec<ValidationError>,
    ) {
        if !(0.0..=1.0).contains(&settings.threshold) {
            errors.push(ValidationError::ThresholdOutOfRange {
                scope: scope.to_string(),
                value: settings.threshold,
            });
        }

        let mut names = HashSet::new();
        for route in routes {
            if route.name.is_empty() {
                errors.push(ValidationError::EmptyRouteName {
                    scope: scope.to_string(),
                });
            } else if !names.insert(route.name.as_str()) {
                errors.push(ValidationError::DuplicateRouteName {
                    scope: scope.to_string(),
                    name: route.name.clone(),
                });
            }

            let path = format!("{}.{}", scope, route.name);
            let template = route.template.as_deref().unwrap_or("");
            if let Err(e) = Template::parse(template) {
                errors.push(ValidationError::InvalidTemplate {
                    route: path.clone(),
                    template: template.to_string(),
                    reason: e.to_string(),
                });
            }
            self.check_target(&path, &route.target, errors);
        }
    }

    fn check_target(&self, path: &str, target: &TargetConfig, errors: &mut Vec<ValidationError>) {
        match target {
            TargetConfig::Echo => {}
            TargetConfig::Static { status, .. } => {
                if StatusCode::from_u16(*status).is_err() {
                    errors.push(ValidationError::InvalidStatus {
                        route: path.to_string(),
                        status: *status,
                    });
                }
            }
            TargetConfig::Redirect { target, mode } => {
                if let Err(e) = Template::parse(target) {
                    errors.push(ValidationError::InvalidRedirectTarget {
                        route: path.to_string(),
                        target: target.clone(),
                        reason: e.to_string(),
                    });
                }
                if *mode == RedirectMode::ServerOutbound && !self.has_clients {
                    errors.push(ValidationError::OutboundWithoutClients {
                        route: path.to_string(),
                    });
                }
            }
            TargetConfig::Router {
                settings,
                routes,
                default,
            } => {
                self.check_router(path, settings, routes, errors);
                if let Some(default) = default {
                    self.check_target(&format!("{}.default", path), default, errors);
                }
            }
        }
    }
}
