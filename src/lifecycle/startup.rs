//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated `AppConfig` into a live routing tree
//! - Create the outbound clients and the client router
//! - Rebuild the tree on reload and swap it in under live traffic
//!
//! # Design Decisions
//! - Fail fast: any build error is fatal at startup and rejected on reload
//! - Reload builds the complete new tree first; nothing running is touched
//!   until the build succeeded
//! - The root router keeps its identity across reloads; only its route
//!   table is replaced, in one store

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::client::{Client, ClientList, ClientRouter, FileClient, HttpClient};
use crate::config::schema::{AppConfig, ClientConfig, RouteConfig, TargetConfig};
use crate::error::{AttachError, DispatchError};
use crate::exchange::Exchange;
use crate::handler::{Echo, RedirectMode, Redirector, Static, Target};
use crate::routing::{Router, RouterSettings, Template, TemplateError};

pub const ROOT_ROUTER: &str = "root";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{route}: {source}")]
    Attach {
        route: String,
        #[source]
        source: AttachError,
    },

    #[error("{route}: invalid status code {status}")]
    InvalidStatus { route: String, status: u16 },

    #[error("{route}: invalid redirect target: {source}")]
    RedirectTarget {
        route: String,
        #[source]
        source: TemplateError,
    },

    #[error("http client '{0}' needs a running tokio runtime")]
    NoRuntime(String),
}

/// The live routing tree plus its outbound side.
pub struct Dispatcher {
    root: Arc<Router>,
    clients: Arc<ClientList>,
    client_router: Arc<ClientRouter>,
}

impl Dispatcher {
    /// Build and start everything `config` describes.
    pub fn build(config: &AppConfig) -> Result<Self, StartupError> {
        let clients = Arc::new(ClientList::new());
        let client_router = Arc::new(ClientRouter::new(clients.clone()));
        let dispatcher = Self {
            root: Arc::new(Router::with_settings(ROOT_ROUTER, config.router.clone())),
            clients,
            client_router,
        };

        let fresh = dispatcher.build_tree(config)?;
        dispatcher.clients.replace_all(build_clients(&config.clients)?);
        dispatcher.commit(&config.router, &fresh);

        tracing::info!(
            routes = dispatcher.root.route_count(),
            clients = dispatcher.clients.len(),
            "Routing tree built"
        );
        Ok(dispatcher)
    }

    /// Replace the routing tree and client set with those of `config`.
    /// On error the running tree is left untouched.
    pub fn reload(&self, config: &AppConfig) -> Result<(), StartupError> {
        let fresh = self.build_tree(config)?;
        let clients = build_clients(&config.clients)?;

        self.clients.replace_all(clients);
        self.commit(&config.router, &fresh);

        tracing::info!(
            routes = self.root.route_count(),
            clients = self.clients.len(),
            "Routing tree reloaded"
        );
        Ok(())
    }

    pub fn root(&self) -> &Arc<Router> {
        &self.root
    }

    pub fn client_router(&self) -> &Arc<ClientRouter> {
        &self.client_router
    }

    pub fn clients(&self) -> &Arc<ClientList> {
        &self.clients
    }

    /// Dispatch through the root router.
    pub fn handle(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        self.root.handle(exchange)
    }

    pub fn stop(&self) {
        self.root.stop();
        self.client_router.stop();
    }

    fn commit(&self, settings: &RouterSettings, fresh: &Router) {
        self.client_router.start();

        // Threshold and mode travel with the adopted table.
        self.root.set_matching_mode(settings.matching_mode);
        self.root.set_case_sensitive(settings.case_sensitive);
        self.root.set_matching_query(settings.matching_query);
        self.root.adopt(fresh);
        self.root.start();
    }

    fn build_tree(&self, config: &AppConfig) -> Result<Router, StartupError> {
        let fresh = Router::with_settings(ROOT_ROUTER, config.router.clone());
        self.attach_all(&fresh, ROOT_ROUTER, &config.routes, config.default.as_ref())?;
        Ok(fresh)
    }

    fn attach_all(
        &self,
        router: &Router,
        scope: &str,
        routes: &[RouteConfig],
        default: Option<&TargetConfig>,
    ) -> Result<(), StartupError> {
        for route in routes {
            let path = format!("{}.{}", scope, route.name);
            let target = self.build_target(&path, &route.target)?;
            let attached = match route.matching_mode {
                Some(mode) => {
                    router.attach_with_mode(route.template.as_deref().unwrap_or(""), target, mode)
                }
                None => router.attach(route.template.as_deref(), target),
            };
            attached.map_err(|source| StartupError::Attach {
                route: path.clone(),
                source,
            })?;
        }

        if let Some(default) = default {
            let path = format!("{}.default", scope);
            let target = self.build_target(&path, default)?;
            router
                .attach_default(target)
                .map_err(|source| StartupError::Attach { route: path, source })?;
        }
        Ok(())
    }

    fn build_target(&self, path: &str, config: &TargetConfig) -> Result<Target, StartupError> {
        let target = match config {
            TargetConfig::Echo => Target::handler(Echo),
            TargetConfig::Static { status, body } => {
                let code = StatusCode::from_u16(*status).map_err(|_| StartupError::InvalidStatus {
                    route: path.to_string(),
                    status: *status,
                })?;
                Target::handler(Static::new(code, body.clone()))
            }
            TargetConfig::Redirect { target, mode } => {
                let template = Template::parse(target).map_err(|source| StartupError::RedirectTarget {
                    route: path.to_string(),
                    source,
                })?;
                let redirector = match mode {
                    RedirectMode::ServerOutbound => {
                        Redirector::outbound(template, self.client_router.clone())
                    }
                    mode => Redirector::client(template, *mode),
                };
                Target::handler(redirector)
            }
            TargetConfig::Router {
                settings,
                routes,
                default,
            } => {
                let router = Arc::new(Router::with_settings(path, settings.clone()));
                self.attach_all(&router, path, routes, default.as_deref())?;
                Target::router(router)
            }
        };
        Ok(target)
    }
}

/// Apply configurations from `updates` until the channel closes.
pub async fn apply_reloads(dispatcher: Arc<Dispatcher>, mut updates: mpsc::UnboundedReceiver<AppConfig>) {
    while let Some(config) = updates.recv().await {
        if let Err(e) = dispatcher.reload(&config) {
            tracing::error!(error = %e, "Reload rejected, keeping current routes");
        }
    }
}

fn build_clients(configs: &[ClientConfig]) -> Result<Vec<Arc<dyn Client>>, StartupError> {
    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Client>, StartupError> {
            match config {
                ClientConfig::Http { name, timeout_secs } => {
                    let handle =
                        Handle::try_current().map_err(|_| StartupError::NoRuntime(name.clone()))?;
                    Ok(Arc::new(HttpClient::new(
                        name.clone(),
                        handle,
                        Duration::from_secs(*timeout_secs),
                    )))
                }
                ClientConfig::File { name, root } => {
                    Ok(Arc::new(FileClient::new(name.clone(), root.clone())))
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::exchange::Request;
    use crate::lifecycle::state::LifecycleState;

    const TREE: &str = r#"
        [[routes]]
        name = "users"
        template = "/users"
        [routes.target]
        type = "router"
        [[routes.target.routes]]
        name = "user"
        template = "/{username}"
        target = { type = "static", body = "user" }

        [[routes]]
        name = "old"
        template = "/old{rest:all}"
        target = { type = "redirect", target = "/new{rest}", mode = "permanent" }

        [default]
        type = "static"
        status = 404
        body = "fallback"
    "#;

    #[test]
    fn test_build_tree_from_config() {
        let config = parse_config(TREE).unwrap();
        let dispatcher = Dispatcher::build(&config).unwrap();
        assert_eq!(dispatcher.root().route_count(), 2);
        assert_eq!(dispatcher.root().state(), LifecycleState::Running);

        let mut ex = Exchange::new(Request::get("/users/alice"));
        dispatcher.handle(&mut ex).unwrap();
        assert_eq!(ex.response.entity().unwrap().as_ref(), b"user");
        assert_eq!(ex.request.attributes().get_str("username"), Some("alice"));

        let mut ex = Exchange::new(Request::get("/old/a/b"));
        dispatcher.handle(&mut ex).unwrap();
        assert_eq!(ex.response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(ex.response.location(), Some("/new/a/b"));

        let mut ex = Exchange::new(Request::get("/nowhere"));
        dispatcher.handle(&mut ex).unwrap();
        assert_eq!(ex.response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_reload_swaps_routes() {
        let dispatcher = Dispatcher::build(&parse_config(TREE).unwrap()).unwrap();
        let root = dispatcher.root().clone();

        let next = parse_config(
            r#"
            [router]
            threshold = 0.9

            [[routes]]
            name = "ping"
            template = "/ping"
            target = { type = "static", body = "pong" }
            "#,
        )
        .unwrap();
        dispatcher.reload(&next).unwrap();

        assert!(Arc::ptr_eq(&root, dispatcher.root()));
        assert_eq!(root.route_count(), 1);
        assert_eq!(root.threshold(), 0.9);

        let mut ex = Exchange::new(Request::get("/users/alice"));
        assert!(dispatcher.handle(&mut ex).unwrap_err().is_no_route());
    }

    #[test]
    fn test_file_clients_are_routed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "A").unwrap();
        let config = parse_config(&format!(
            r#"
            [[clients]]
            type = "file"
            name = "files"
            root = "{}"

            [[routes]]
            name = "files"
            template = "/files{{rest:all}}"
            target = {{ type = "redirect", target = "file://{{rest}}", mode = "server_outbound" }}
            "#,
            dir.path().display().to_string().replace('\\', "/")
        ))
        .unwrap();

        let dispatcher = Dispatcher::build(&config).unwrap();
        assert_eq!(dispatcher.client_router().routes().len(), 1);

        let mut ex = Exchange::new(Request::get("/files/a.txt"));
        dispatcher.handle(&mut ex).unwrap();
        assert_eq!(ex.response.status(), StatusCode::OK);
        assert_eq!(ex.response.entity().unwrap().as_ref(), b"A");
    }

    #[test]
    fn test_http_client_without_runtime_fails() {
        let config = parse_config(
            r#"
            [[clients]]
            type = "http"
            name = "upstream"
            "#,
        )
        .unwrap();
        assert!(matches!(
            Dispatcher::build(&config),
            Err(StartupError::NoRuntime(_))
        ));
    }
}
