//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! dispatcher. All types derive Serde traits for deserialization from
//! config files.
//!
//! Routes nest: a route whose target is a `router` carries its own route
//! list, so a whole routing tree is described in one file.

use std::path::PathBuf;

use serde::Deserialize;

use crate::handler::RedirectMode;
use crate::routing::{MatchingMode, RouterSettings};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Inbound HTTP connector.
    pub server: ServerConfig,

    /// Settings of the root router.
    pub router: RouterSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Outbound clients available to `server_outbound` redirects.
    pub clients: Vec<ClientConfig>,

    /// Routes of the root router, in attach order.
    pub routes: Vec<RouteConfig>,

    /// Fallback target of the root router.
    pub default: Option<TargetConfig>,
}

/// Inbound connector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter (trace, debug, info, warn, error, or a full directive).
    pub log_level: String,

    /// Emit JSON log lines instead of text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Outbound client definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientConfig {
    Http {
        name: String,
        #[serde(default = "default_client_timeout")]
        timeout_secs: u64,
    },
    File {
        name: String,
        root: PathBuf,
    },
}

impl ClientConfig {
    pub fn name(&self) -> &str {
        match self {
            ClientConfig::Http { name, .. } | ClientConfig::File { name, .. } => name,
        }
    }
}

fn default_client_timeout() -> u64 {
    30
}

/// One attached route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Route identifier for logging; unique among siblings.
    pub name: String,

    /// URI template. Omitted means the empty template (matches everything).
    #[serde(default)]
    pub template: Option<String>,

    /// Overrides the owning router's matching mode.
    #[serde(default)]
    pub matching_mode: Option<MatchingMode>,

    pub target: TargetConfig,
}

/// What a route dispatches to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    /// Reply with the request attributes as JSON.
    Echo,

    /// Fixed response.
    Static {
        #[serde(default = "default_status")]
        status: u16,
        #[serde(default)]
        body: String,
    },

    /// Rewrite the target from request attributes.
    Redirect {
        target: String,
        #[serde(default = "default_redirect_mode")]
        mode: RedirectMode,
    },

    /// Nested router.
    Router {
        #[serde(default)]
        settings: RouterSettings,
        #[serde(default)]
        routes: Vec<RouteConfig>,
        #[serde(default)]
        default: Option<Box<TargetConfig>>,
    },
}

fn default_status() -> u16 {
    200
}

fn default_redirect_mode() -> RedirectMode {
    RedirectMode::Found
}
