//! Routes: a target plus the criteria used to score it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::client::Client;
use crate::error::DispatchError;
use crate::exchange::{Exchange, Protocol};
use crate::handler::{Handler, Target};
use crate::routing::matcher::{Evaluation, MatchKind, ProtocolMatcher, TemplateMatcher};
use crate::routing::template::{MatchOptions, Template, TemplateError};

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique route identifier, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(u64);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route-{}", self.0)
    }
}

/// A scored candidate binding from matching criteria to a target.
///
/// Criteria are fixed at construction. To change a template, detach the
/// route and attach a new one.
#[derive(Debug)]
pub struct Route {
    id: RouteId,
    target: Target,
    kind: MatchKind,
}

impl Route {
    pub fn new(target: Target, kind: MatchKind) -> Self {
        Self {
            id: RouteId(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed)),
            target,
            kind,
        }
    }

    /// Template route.
    pub fn template(
        template: &Template,
        target: Target,
        options: MatchOptions,
        matching_query: bool,
    ) -> Result<Self, TemplateError> {
        let matcher = TemplateMatcher::new(template, options, matching_query)?;
        Ok(Self::new(target, MatchKind::Template(matcher)))
    }

    /// Protocol-only route to an arbitrary target.
    pub fn protocol(target: Target, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        Self::new(target, MatchKind::Protocol(ProtocolMatcher::new(protocols)))
    }

    /// Client route: scores on the protocols the client declares.
    pub fn client(client: Arc<dyn Client>) -> Self {
        let protocols = client.protocols().to_vec();
        Self::protocol(Target::Client(client), protocols)
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn kind(&self) -> &MatchKind {
        &self.kind
    }

    /// Template this route matches with, if it is a template route.
    pub fn template_ref(&self) -> Option<&Template> {
        match &self.kind {
            MatchKind::Template(m) => Some(m.template()),
            MatchKind::Protocol(_) => None,
        }
    }

    pub fn variable_count(&self) -> usize {
        self.kind.variable_count()
    }

    /// Score in `[0, 1]`. Does not touch the exchange.
    pub fn score(&self, exchange: &Exchange) -> f32 {
        self.evaluate(exchange).score
    }

    /// Score and keep the match for a later [`Route::dispatch`].
    pub fn evaluate(&self, exchange: &Exchange) -> Evaluation {
        self.kind.evaluate(&exchange.request)
    }

    /// Commit the bindings found by `evaluation`, then invoke the target.
    pub fn dispatch(
        &self,
        evaluation: Evaluation,
        exchange: &mut Exchange,
    ) -> Result<(), DispatchError> {
        if let Some(matched) = evaluation.matched {
            let request = &mut exchange.request;
            for (name, value) in matched.variables {
                request.attributes_mut().insert(name, value);
            }
            request.advance_base(matched.matched_len);
        }
        self.target.respond(exchange)
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match &self.kind {
            MatchKind::Template(m) => format!("{} '{}' -> {}", self.id, m.template(), self.target.label()),
            MatchKind::Protocol(m) => {
                let names: Vec<&str> = m.protocols().iter().map(|p| p.name()).collect();
                format!("{} [{}] -> {}", self.id, names.join(","), self.target.label())
            }
        }
    }
}
