//! Local file client.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use axum::http::{Method, StatusCode};

use crate::client::Client;
use crate::error::{DispatchError, HandlerFault};
use crate::exchange::{Exchange, Protocol};
use crate::handler::Handler;

const PROTOCOLS: [Protocol; 1] = [Protocol::File];

/// Serves `file:` targets from below a root directory.
///
/// The target path is taken relative to the root; `..` and other non-normal
/// components are refused with 403.
#[derive(Debug, Clone)]
pub struct FileClient {
    name: String,
    root: PathBuf,
}

impl FileClient {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl Handler for FileClient {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let method = exchange.request.method().clone();
        if method != Method::GET && method != Method::HEAD {
            exchange.response.set_status(StatusCode::METHOD_NOT_ALLOWED);
            return Ok(());
        }

        let Some(path) = exchange.request.path().and_then(|p| self.resolve(p)) else {
            exchange.response.set_status(StatusCode::FORBIDDEN);
            return Ok(());
        };

        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(client = %self.name, path = %path.display(), size = bytes.len(), "File read");
                exchange.response.set_status(StatusCode::OK);
                if method == Method::GET {
                    exchange.response.set_entity(bytes);
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                exchange.response.set_status(StatusCode::NOT_FOUND);
                Ok(())
            }
            Err(e) => Err(HandlerFault::with_source(
                format!("cannot read {}", path.display()),
                e,
            )
            .into()),
        }
    }
}

impl Client for FileClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocols(&self) -> &[Protocol] {
        &PROTOCOLS
    }
}
