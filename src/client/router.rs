//! Protocol-based outbound dispatch.
//!
//! # Responsibilities
//! - Keep exactly one protocol route per available client
//! - Rebuild that list on every start without exposing a partial list
//!
//! # Design Decisions
//! - Start snapshots the client set, builds the full route list, then swaps
//!   it in with one store; concurrent dispatch sees old or new, never mixed
//! - Restarting while running recomputes and replaces
//! - Stop clears the routes; an unstarted or stopped router matches nothing
//! - Start and stop are serialized, so the final state always agrees with
//!   the route list

use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::list::same_client;
use crate::client::{Client, ClientSet};
use crate::error::DispatchError;
use crate::exchange::Exchange;
use crate::handler::Handler;
use crate::lifecycle::state::LifecycleState;
use crate::routing::{Route, Router};

pub struct ClientRouter {
    router: Router,
    clients: Arc<dyn ClientSet>,
    transition: Mutex<()>,
}

impl ClientRouter {
    pub fn new(clients: Arc<dyn ClientSet>) -> Self {
        Self {
            router: Router::new("clients"),
            clients,
            transition: Mutex::new(()),
        }
    }

    /// Snapshot the client set and replace the route list.
    pub fn start(&self) {
        let _transition = self.transition.lock();
        self.router.mark(LifecycleState::Starting);

        let mut seen: Vec<Arc<dyn Client>> = Vec::new();
        for client in self.clients.available_clients() {
            if !seen.iter().any(|c| same_client(c, &client)) {
                seen.push(client);
            }
        }

        let routes: Vec<Arc<Route>> = seen
            .iter()
            .map(|client| Arc::new(Route::client(client.clone())))
            .collect();
        let count = routes.len();

        self.router.replace_routes(routes);
        self.router.start();
        tracing::info!(clients = count, "Client router refreshed");
    }

    pub fn stop(&self) {
        let _transition = self.transition.lock();
        self.router.mark(LifecycleState::Stopping);
        self.router.clear();
        self.router.stop();
        tracing::info!("Client router stopped");
    }

    pub fn state(&self) -> LifecycleState {
        self.router.state()
    }

    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.router.routes()
    }

    /// The underlying router, for selection settings.
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn handle(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        self.router.handle(exchange)
    }
}

impl Handler for ClientRouter {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        self.handle(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientList, FileClient};
    use crate::exchange::{Protocol, Request};

    struct Named(&'static str, Protocol);

    impl Handler for Named {
        fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
            exchange.response.set_entity(self.0);
            Ok(())
        }
    }

    impl Client for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn protocols(&self) -> &[Protocol] {
            std::slice::from_ref(&self.1)
        }
    }

    #[test]
    fn test_one_route_per_client() {
        let list = Arc::new(ClientList::new());
        let http: Arc<dyn Client> = Arc::new(Named("http", Protocol::Http));
        list.add(http.clone());
        list.add(Arc::new(FileClient::new("files", "/tmp")));

        let router = ClientRouter::new(list.clone());
        assert!(router.routes().is_empty());

        router.start();
        assert_eq!(router.state(), LifecycleState::Running);
        assert_eq!(router.routes().len(), 2);

        let mut ex = Exchange::new(Request::get("http://example.com/"));
        router.handle(&mut ex).unwrap();
        assert_eq!(ex.response.entity().unwrap().as_ref(), b"http");
    }

    #[test]
    fn test_restart_tracks_client_set() {
        let list = Arc::new(ClientList::new());
        list.add(Arc::new(Named("http", Protocol::Http)));
        let router = ClientRouter::new(list.clone());
        router.start();
        assert_eq!(router.routes().len(), 1);

        list.add(Arc::new(Named("ftp", Protocol::Ftp)));
        router.start();
        assert_eq!(router.routes().len(), 2);

        list.remove("http");
        router.start();
        assert_eq!(router.routes().len(), 1);
    }

    #[test]
    fn test_stop_clears_routes() {
        let list = Arc::new(ClientList::new());
        list.add(Arc::new(Named("http", Protocol::Http)));
        let router = ClientRouter::new(list);
        router.start();
        router.stop();

        assert!(router.routes().is_empty());
        assert_eq!(router.state(), LifecycleState::Stopped);
        let mut ex = Exchange::new(Request::get("http://example.com/"));
        assert!(router.handle(&mut ex).unwrap_err().is_no_route());
    }

    struct Watching {
        router: std::sync::OnceLock<std::sync::Weak<ClientRouter>>,
        seen: parking_lot::Mutex<Vec<LifecycleState>>,
    }

    impl ClientSet for Watching {
        fn available_clients(&self) -> Vec<Arc<dyn Client>> {
            if let Some(router) = self.router.get().and_then(|r| r.upgrade()) {
                self.seen.lock().push(router.state());
            }
            vec![Arc::new(Named("http", Protocol::Http))]
        }
    }

    #[test]
    fn test_snapshot_taken_while_starting() {
        let set = Arc::new(Watching {
            router: std::sync::OnceLock::new(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let router = Arc::new(ClientRouter::new(set.clone()));
        set.router.set(Arc::downgrade(&router)).unwrap();

        router.start();
        router.start();

        assert_eq!(
            *set.seen.lock(),
            vec![LifecycleState::Starting, LifecycleState::Starting]
        );
        assert_eq!(router.state(), LifecycleState::Running);
    }
}
