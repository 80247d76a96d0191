//! Mutable client registry.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::client::{Client, ClientSet};

/// Client set backed by a swappable list.
///
/// Readers get a consistent snapshot; writers are serialized.
pub struct ClientList {
    clients: ArcSwap<Vec<Arc<dyn Client>>>,
    writer: Mutex<()>,
}

impl Default for ClientList {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientList {
    pub fn new() -> Self {
        Self {
            clients: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    /// Add a client. Returns false if this exact client is already listed.
    pub fn add(&self, client: Arc<dyn Client>) -> bool {
        let _writer = self.writer.lock();
        let current = self.clients.load();
        if current.iter().any(|c| same_client(c, &client)) {
            return false;
        }
        let mut next = current.to_vec();
        next.push(client);
        self.clients.store(Arc::new(next));
        true
    }

    /// Remove every client with this name. Returns how many were removed.
    pub fn remove(&self, name: &str) -> usize {
        let _writer = self.writer.lock();
        let current = self.clients.load();
        let next: Vec<Arc<dyn Client>> = current
            .iter()
            .filter(|c| c.name() != name)
            .cloned()
            .collect();
        let removed = current.len() - next.len();
        self.clients.store(Arc::new(next));
        removed
    }

    pub fn replace_all(&self, clients: Vec<Arc<dyn Client>>) {
        let _writer = self.writer.lock();
        self.clients.store(Arc::new(clients));
    }

    pub fn len(&self) -> usize {
        self.clients.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.load().is_empty()
    }
}

impl ClientSet for ClientList {
    fn available_clients(&self) -> Vec<Arc<dyn Client>> {
        self.clients.load().to_vec()
    }
}

pub(crate) fn same_client(a: &Arc<dyn Client>, b: &Arc<dyn Client>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
