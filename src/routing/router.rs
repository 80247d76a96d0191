//! Route selection and dispatch.
//!
//! # Responsibilities
//! - Hold an ordered route list plus an optional default target
//! - Score routes for an exchange and pick one according to the routing mode
//! - Commit the winner's bindings and hand the exchange to its target
//! - Attach/detach routes while traffic is flowing
//!
//! # Design Decisions
//! - Routes, default target, threshold and mode form one immutable
//!   snapshot behind `ArcSwap`; every `handle` call loads it once and never
//!   sees a half-applied change
//! - Writers copy the snapshot, edit the copy and swap it in under a mutex,
//!   so attach/detach are serialized but never block readers
//! - Insertion order is the tie-break; duplicate routes are allowed
//! - Attaching a router beneath itself is rejected; router-to-router
//!   attaches are serialized process-wide so two concurrent attaches cannot
//!   close a cycle between them. Routers wrapped as plain handlers count
//! - Dispatch nesting is capped per thread; a loop built through an opaque
//!   closure ends in a handler fault instead of a stack overflow

use std::borrow::Cow;
use std::cell::Cell;
use std::collections::HashSet;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{AttachError, DispatchError};
use crate::exchange::Exchange;
use crate::handler::{Handler, Target};
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::observability::metrics;
use crate::routing::matcher::Evaluation;
use crate::routing::mode::{weighted_pick, Candidate, RoutingMode};
use crate::routing::route::Route;
use crate::routing::template::{MatchOptions, MatchingMode, Template};

/// Default selection threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Deepest chain of nested router dispatches on one thread.
pub const MAX_NESTING: usize = 64;

static TOPOLOGY: Mutex<()> = parking_lot::const_mutex(());

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

/// One level of router nesting on the current thread.
struct NestingGuard;

impl NestingGuard {
    fn enter() -> Option<Self> {
        NESTING.with(|depth| {
            let current = depth.get();
            if current >= MAX_NESTING {
                return None;
            }
            depth.set(current + 1);
            Some(NestingGuard)
        })
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Router settings, also used as the `[router]` configuration table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Minimum score a route needs to be selected.
    pub threshold: f32,
    pub mode: RoutingMode,
    /// Matching mode for templates attached without an explicit one.
    pub matching_mode: MatchingMode,
    pub case_sensitive: bool,
    /// Append `?query` to the remaining part before matching.
    pub matching_query: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            mode: RoutingMode::Best,
            matching_mode: MatchingMode::StartsWith,
            case_sensitive: true,
            matching_query: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AttachDefaults {
    options: MatchOptions,
    matching_query: bool,
}

#[derive(Clone)]
struct RouteTable {
    routes: Vec<Arc<Route>>,
    default: Option<Target>,
    threshold: f32,
    mode: RoutingMode,
}

impl RouteTable {
    fn targets(&self) -> impl Iterator<Item = &Target> {
        self.routes
            .iter()
            .map(|r| r.target())
            .chain(self.default.iter())
    }

    fn nested_routers(&self) -> impl Iterator<Item = &Router> {
        self.targets().filter_map(|t| t.nested_router())
    }
}

/// The route picked for an exchange, with its cached match.
#[derive(Debug)]
pub struct Selection {
    route: Arc<Route>,
    evaluation: Evaluation,
}

impl Selection {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn score(&self) -> f32 {
        self.evaluation.score
    }

    pub fn bindings(&self) -> &[(String, String)] {
        self.evaluation.bindings()
    }

    /// Commit and invoke the selected route.
    pub fn dispatch(self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        self.route.dispatch(self.evaluation, exchange)
    }
}

/// Ordered routes plus a selection policy. A router is itself a handler.
pub struct Router {
    name: String,
    table: ArcSwap<RouteTable>,
    writer: Mutex<AttachDefaults>,
    cursor: AtomicUsize,
    lifecycle: Lifecycle,
}

impl Router {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, RouterSettings::default())
    }

    pub fn with_settings(name: impl Into<String>, settings: RouterSettings) -> Self {
        let name = name.into();
        let threshold = checked_threshold(&name, settings.threshold).unwrap_or(DEFAULT_THRESHOLD);
        Self {
            table: ArcSwap::from_pointee(RouteTable {
                routes: Vec::new(),
                default: None,
                threshold,
                mode: settings.mode,
            }),
            name,
            writer: Mutex::new(AttachDefaults {
                options: MatchOptions {
                    mode: settings.matching_mode,
                    case_sensitive: settings.case_sensitive,
                },
                matching_query: settings.matching_query,
            }),
            cursor: AtomicUsize::new(0),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> f32 {
        self.table.load().threshold
    }

    /// Set the selection threshold, clamped to `[0, 1]`. Non-finite values
    /// are ignored.
    pub fn set_threshold(&self, threshold: f32) {
        if let Some(threshold) = checked_threshold(&self.name, threshold) {
            self.update(|table| table.threshold = threshold);
        }
    }

    pub fn mode(&self) -> RoutingMode {
        self.table.load().mode.clone()
    }

    pub fn set_mode(&self, mode: RoutingMode) {
        tracing::debug!(router = %self.name, mode = mode.name(), "Routing mode set");
        self.update(|table| table.mode = mode);
    }

    /// Matching mode for templates attached from now on.
    pub fn set_matching_mode(&self, mode: MatchingMode) {
        self.writer.lock().options.mode = mode;
    }

    /// Case policy for templates attached from now on.
    pub fn set_case_sensitive(&self, case_sensitive: bool) {
        self.writer.lock().options.case_sensitive = case_sensitive;
    }

    /// Query matching for templates attached from now on.
    pub fn set_matching_query(&self, matching_query: bool) {
        self.writer.lock().matching_query = matching_query;
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Attach `target` under a template. `None` attaches with the empty
    /// template, which matches any path prefix.
    pub fn attach(&self, template: Option<&str>, target: Target) -> Result<Arc<Route>, AttachError> {
        let route = self.build_route(template.unwrap_or(""), target, None)?;
        self.attach_route(route)
    }

    /// Attach with an explicit matching mode instead of the router default.
    pub fn attach_with_mode(
        &self,
        template: &str,
        target: Target,
        mode: MatchingMode,
    ) -> Result<Arc<Route>, AttachError> {
        let route = self.build_route(template, target, Some(mode))?;
        self.attach_route(route)
    }

    /// Attach a prebuilt route at the end of the list.
    pub fn attach_route(&self, route: Route) -> Result<Arc<Route>, AttachError> {
        let route = Arc::new(route);
        let _topology = route.target().nested_router().map(|_| TOPOLOGY.lock());
        self.check_cycle(route.target())?;

        self.update(|table| table.routes.push(route.clone()));
        tracing::info!(router = %self.name, route = %route.describe(), "Route attached");
        Ok(route)
    }

    /// Target used when no route reaches the threshold.
    pub fn attach_default(&self, target: Target) -> Result<(), AttachError> {
        let _topology = target.nested_router().map(|_| TOPOLOGY.lock());
        self.check_cycle(&target)?;

        tracing::info!(router = %self.name, target = %target.label(), "Default route attached");
        self.update(|table| table.default = Some(target));
        Ok(())
    }

    pub fn detach_default(&self) -> bool {
        self.update(|table| table.default.take().is_some())
    }

    /// Remove one route. Returns false if it was not attached here.
    pub fn detach(&self, route: &Arc<Route>) -> bool {
        let removed = self.update(|table| {
            let before = table.routes.len();
            table.routes.retain(|r| !Arc::ptr_eq(r, route));
            before != table.routes.len()
        });
        if removed {
            tracing::info!(router = %self.name, route = %route.describe(), "Route detached");
        }
        removed
    }

    /// Remove every route pointing at `target`. Returns how many were removed.
    pub fn detach_target(&self, target: &Target) -> usize {
        let removed = self.update(|table| {
            let before = table.routes.len();
            table.routes.retain(|r| !r.target().same_as(target));
            before - table.routes.len()
        });
        if removed > 0 {
            tracing::info!(router = %self.name, target = %target.label(), removed, "Target detached");
        }
        removed
    }

    /// Remove every route and the default target.
    pub fn clear(&self) {
        self.update(|table| {
            table.routes.clear();
            table.default = None;
        });
    }

    /// Current route list, in selection order.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.table.load().routes.clone()
    }

    pub fn route_count(&self) -> usize {
        self.table.load().routes.len()
    }

    /// Swap in a whole route list at once.
    pub(crate) fn replace_routes(&self, routes: Vec<Arc<Route>>) {
        self.update(|table| table.routes = routes);
    }

    /// Take over another router's routes, default target, threshold and
    /// mode in one swap.
    pub(crate) fn adopt(&self, other: &Router) {
        let _writer = self.writer.lock();
        let table = other.table.load_full();
        metrics::record_route_count(&self.name, table.routes.len());
        self.table.store(table);
    }

    /// Choose a route without dispatching.
    pub fn select(&self, exchange: &Exchange) -> Option<Selection> {
        self.select_in(&self.table.load(), exchange)
    }

    /// Route the exchange to the selected target.
    pub fn handle(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let Some(_depth) = NestingGuard::enter() else {
            tracing::warn!(router = %self.name, max = MAX_NESTING, "Router nesting too deep");
            return Err(DispatchError::fault(format!(
                "router '{}' nested deeper than {} levels",
                self.name, MAX_NESTING
            )));
        };
        let table = self.table.load_full();

        if let Some(selection) = self.select_in(&table, exchange) {
            tracing::debug!(
                router = %self.name,
                route = %selection.route.describe(),
                score = selection.score(),
                "Route selected"
            );
            metrics::record_dispatch(&self.name, "matched");
            return selection.dispatch(exchange);
        }

        if let Some(default) = &table.default {
            tracing::debug!(router = %self.name, target = %default.label(), "Using default route");
            metrics::record_dispatch(&self.name, "default");
            return default.respond(exchange);
        }

        let path = exchange
            .request
            .remaining_part(false)
            .map(Cow::into_owned)
            .unwrap_or_else(|| exchange.request.target().to_string());
        tracing::debug!(router = %self.name, path = %path, "No route matched");
        metrics::record_dispatch(&self.name, "no_route");
        Err(DispatchError::NoRouteMatched {
            router: self.name.clone(),
            path,
        })
    }

    pub(crate) fn mark(&self, state: LifecycleState) {
        self.lifecycle.set(state);
    }

    /// Mark the router running, starting nested routers first.
    pub fn start(&self) {
        self.lifecycle.set(LifecycleState::Starting);
        let table = self.table.load_full();
        for child in table.nested_routers() {
            if !child.lifecycle.is_running() {
                child.start();
            }
        }
        self.lifecycle.set(LifecycleState::Running);
        tracing::debug!(router = %self.name, routes = table.routes.len(), "Router started");
    }

    /// Mark the router stopped, stopping nested routers first.
    pub fn stop(&self) {
        self.lifecycle.set(LifecycleState::Stopping);
        let table = self.table.load_full();
        for child in table.nested_routers() {
            if child.lifecycle.is_running() {
                child.stop();
            }
        }
        self.lifecycle.set(LifecycleState::Stopped);
        tracing::debug!(router = %self.name, "Router stopped");
    }

    fn build_route(
        &self,
        pattern: &str,
        target: Target,
        mode: Option<MatchingMode>,
    ) -> Result<Route, AttachError> {
        let template = Template::parse(pattern).map_err(|e| AttachError::from_template(pattern, e))?;
        let defaults = *self.writer.lock();
        let options = MatchOptions {
            mode: mode.unwrap_or(defaults.options.mode),
            case_sensitive: defaults.options.case_sensitive,
        };
        Route::template(&template, target, options, defaults.matching_query)
            .map_err(|e| AttachError::from_template(pattern, e))
    }

    fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut RouteTable) -> R,
    {
        let _writer = self.writer.lock();
        let mut next = RouteTable::clone(&self.table.load());
        let result = f(&mut next);
        metrics::record_route_count(&self.name, next.routes.len());
        self.table.store(Arc::new(next));
        result
    }

    fn check_cycle(&self, target: &Target) -> Result<(), AttachError> {
        if let Some(child) = target.nested_router() {
            let me: *const Router = self;
            if ptr::eq(child, me) || child.reaches(me, &mut HashSet::new()) {
                return Err(AttachError::CyclicAttachment {
                    parent: self.name.clone(),
                    child: child.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// True if `needle` is a descendant of this router. Each router is
    /// walked at most once.
    fn reaches(&self, needle: *const Router, visited: &mut HashSet<*const Router>) -> bool {
        if !visited.insert(self as *const Router) {
            return false;
        }
        let table = self.table.load_full();
        let found = table
            .nested_routers()
            .any(|child| ptr::eq(child, needle) || child.reaches(needle, visited));
        found
    }

    fn select_in(&self, table: &RouteTable, exchange: &Exchange) -> Option<Selection> {
        let routes = table.routes.as_slice();
        if routes.is_empty() {
            return None;
        }
        let threshold = table.threshold;

        match &table.mode {
            RoutingMode::Best => {
                let mut best: Option<Selection> = None;
                for route in routes {
                    let evaluation = self.evaluate(route, exchange);
                    let better = match &best {
                        Some(current) => evaluation.score > current.evaluation.score,
                        None => true,
                    };
                    if better {
                        best = Some(Selection {
                            route: route.clone(),
                            evaluation,
                        });
                    }
                }
                best.filter(|b| b.evaluation.score >= threshold)
            }
            RoutingMode::First => routes
                .iter()
                .find_map(|r| self.qualify(r, exchange, threshold)),
            RoutingMode::Last => routes
                .iter()
                .rev()
                .find_map(|r| self.qualify(r, exchange, threshold)),
            RoutingMode::Next => {
                let len = routes.len();
                let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
                (0..len)
                    .map(|i| &routes[(start + i) % len])
                    .find_map(|r| self.qualify(r, exchange, threshold))
            }
            RoutingMode::Random => {
                let mut qualified: Vec<Selection> = routes
                    .iter()
                    .filter_map(|r| self.qualify(r, exchange, threshold))
                    .collect();
                let weights: Vec<f32> = qualified.iter().map(Selection::score).collect();
                weighted_pick(&weights).map(|i| qualified.swap_remove(i))
            }
            RoutingMode::Custom(selector) => {
                let evaluations: Vec<Evaluation> =
                    routes.iter().map(|r| self.evaluate(r, exchange)).collect();
                let candidates: Vec<Candidate<'_>> = routes
                    .iter()
                    .zip(&evaluations)
                    .map(|(route, e)| Candidate {
                        route: route.as_ref(),
                        score: e.score,
                    })
                    .collect();
                let index = selector.select(&candidates, threshold)?;
                let route = routes.get(index)?.clone();
                let evaluation = evaluations.into_iter().nth(index)?;
                Some(Selection { route, evaluation })
            }
        }
    }

    fn evaluate(&self, route: &Route, exchange: &Exchange) -> Evaluation {
        let evaluation = route.evaluate(exchange);
        tracing::trace!(
            router = %self.name,
            route = %route.id(),
            score = evaluation.score,
            "Scored route"
        );
        evaluation
    }

    fn qualify(&self, route: &Arc<Route>, exchange: &Exchange, threshold: f32) -> Option<Selection> {
        let evaluation = self.evaluate(route, exchange);
        (evaluation.score >= threshold).then(|| Selection {
            route: route.clone(),
            evaluation,
        })
    }
}

impl Handler for Router {
    fn respond(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        self.handle(exchange)
    }

    fn nested_router(&self) -> Option<&Router> {
        Some(self)
    }
}

fn checked_threshold(router: &str, threshold: f32) -> Option<f32> {
    if !threshold.is_finite() {
        tracing::warn!(router, threshold, "Ignoring non-finite threshold");
        return None;
    }
    Some(threshold.clamp(0.0, 1.0))
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.name)
            .field("routes", &self.route_count())
            .field("threshold", &self.threshold())
            .field("mode", &self.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Request;
    use crate::handler::{handler_fn, Static};
    use crate::routing::mode::RouteSelector;

    fn tagged(tag: &'static str) -> Target {
        Target::handler(handler_fn(move |ex| {
            ex.response.set_entity(tag);
            Ok(())
        }))
    }

    fn body(ex: &Exchange) -> &[u8] {
        ex.response.entity().map(|b| b.as_ref()).unwrap_or_default()
    }

    #[test]
    fn test_best_prefers_more_specific_route() {
        let router = Router::new("root");
        router.attach(Some("/users/{username}"), tagged("h1")).unwrap();
        router
            .attach(Some("/users/{username}/bookmarks"), tagged("h2"))
            .unwrap();

        let mut ex = Exchange::new(Request::get("/users/alice/bookmarks"));
        router.handle(&mut ex).unwrap();

        assert_eq!(body(&ex), b"h2");
        assert_eq!(ex.request.attributes().get_str("username"), Some("alice"));
    }

    #[test]
    fn test_ties_go_to_earliest_route() {
        let router = Router::new("root");
        router.attach(Some("/a"), tagged("first")).unwrap();
        router.attach(Some("/a"), tagged("second")).unwrap();

        let mut ex = Exchange::new(Request::get("/a"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"first");
    }

    #[test]
    fn test_first_mode_takes_first_qualifying() {
        let router = Router::new("root");
        router.set_mode(RoutingMode::First);
        router.attach(Some("/users/{username}"), tagged("h1")).unwrap();
        router
            .attach(Some("/users/{username}/bookmarks"), tagged("h2"))
            .unwrap();

        let mut ex = Exchange::new(Request::get("/users/alice/bookmarks"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"h1");
        assert_eq!(ex.request.remaining_path(), Some("/bookmarks"));
    }

    #[test]
    fn test_last_mode() {
        let router = Router::new("root");
        router.set_mode(RoutingMode::Last);
        router.attach(Some("/a"), tagged("first")).unwrap();
        router.attach(Some("/a"), tagged("second")).unwrap();
        router.attach(Some("/b"), tagged("other")).unwrap();

        let mut ex = Exchange::new(Request::get("/a"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"second");
    }

    #[test]
    fn test_next_mode_rotates() {
        let router = Router::new("root");
        router.set_mode(RoutingMode::Next);
        router.attach(Some("/a"), tagged("one")).unwrap();
        router.attach(Some("/a"), tagged("two")).unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let mut ex = Exchange::new(Request::get("/a"));
            router.handle(&mut ex).unwrap();
            seen.push(body(&ex).to_vec());
        }
        assert_ne!(seen[0], seen[1]);
        assert_eq!(seen[0], seen[2]);
        assert_eq!(seen[1], seen[3]);
    }

    #[test]
    fn test_random_mode_only_picks_qualifying() {
        let router = Router::new("root");
        router.set_mode(RoutingMode::Random);
        router.attach(Some("/a"), tagged("a")).unwrap();
        router.attach(Some("/b"), tagged("b")).unwrap();

        for _ in 0..50 {
            let mut ex = Exchange::new(Request::get("/b"));
            router.handle(&mut ex).unwrap();
            assert_eq!(body(&ex), b"b");
        }
    }

    struct LowestAboveZero;

    impl RouteSelector for LowestAboveZero {
        fn select(&self, candidates: &[Candidate<'_>], _threshold: f32) -> Option<usize> {
            candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| c.score > 0.0)
                .min_by(|a, b| a.1.score.total_cmp(&b.1.score))
                .map(|(i, _)| i)
        }
    }

    #[test]
    fn test_custom_mode() {
        let router = Router::new("root");
        router.set_mode(RoutingMode::custom(LowestAboveZero));
        router.attach(Some("/users/{username}"), tagged("h1")).unwrap();
        router
            .attach(Some("/users/{username}/bookmarks"), tagged("h2"))
            .unwrap();

        let mut ex = Exchange::new(Request::get("/users/alice/bookmarks"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"h1");
    }

    #[test]
    fn test_default_route_is_fallback() {
        let router = Router::new("root");
        router.attach(Some("/known"), tagged("known")).unwrap();
        router.attach_default(tagged("fallback")).unwrap();

        let mut ex = Exchange::new(Request::get("/unknown"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"fallback");

        assert!(router.detach_default());
        let mut ex = Exchange::new(Request::get("/unknown"));
        assert!(router.handle(&mut ex).unwrap_err().is_no_route());
    }

    #[test]
    fn test_threshold_is_clamped() {
        let router = Router::new("root");
        router.set_threshold(3.0);
        assert_eq!(router.threshold(), 1.0);
        router.set_threshold(f32::NAN);
        assert_eq!(router.threshold(), 1.0);
        router.set_threshold(-1.0);
        assert_eq!(router.threshold(), 0.0);
    }

    #[test]
    fn test_detach_and_detach_target() {
        let router = Router::new("root");
        let shared = Target::handler(Static::ok("x"));
        let a = router.attach(Some("/a"), shared.clone()).unwrap();
        router.attach(Some("/b"), shared.clone()).unwrap();
        router.attach(Some("/c"), tagged("c")).unwrap();

        assert!(router.detach(&a));
        assert!(!router.detach(&a));
        assert_eq!(router.route_count(), 2);

        assert_eq!(router.detach_target(&shared), 1);
        assert_eq!(router.route_count(), 1);

        router.clear();
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_ambiguous_template_rejected() {
        let router = Router::new("root");
        let err = router
            .attach(Some("/{id}/x/{id}"), tagged("x"))
            .unwrap_err();
        assert!(matches!(err, AttachError::AmbiguousTemplate { .. }));
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_invalid_template_rejected() {
        let router = Router::new("root");
        let err = router.attach(Some("/{id"), tagged("x")).unwrap_err();
        assert!(matches!(err, AttachError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_cycles_rejected() {
        let a = Arc::new(Router::new("a"));
        let b = Arc::new(Router::new("b"));
        let c = Arc::new(Router::new("c"));

        let err = a.attach(Some("/self"), Target::router(a.clone())).unwrap_err();
        assert!(matches!(err, AttachError::CyclicAttachment { .. }));

        a.attach(Some("/b"), Target::router(b.clone())).unwrap();
        b.attach(Some("/c"), Target::router(c.clone())).unwrap();

        let err = c.attach(Some("/a"), Target::router(a.clone())).unwrap_err();
        assert!(matches!(err, AttachError::CyclicAttachment { .. }));
        let err = c.attach_default(Target::router(a.clone())).unwrap_err();
        assert!(matches!(err, AttachError::CyclicAttachment { .. }));

        // Sharing a subtree is not a cycle.
        a.attach(Some("/c"), Target::router(c.clone())).unwrap();
    }

    #[test]
    fn test_nested_router_sees_remaining_path() {
        let root = Router::new("root");
        let users = Arc::new(Router::new("users"));
        users.attach(Some("/{username}"), tagged("user")).unwrap();
        root.attach(Some("/users"), Target::router(users.clone())).unwrap();

        let mut ex = Exchange::new(Request::get("/users/bob"));
        root.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"user");
        assert_eq!(ex.request.attributes().get_str("username"), Some("bob"));
    }

    #[test]
    fn test_start_propagates_to_children() {
        let root = Router::new("root");
        let child = Arc::new(Router::new("child"));
        root.attach(Some("/c"), Target::router(child.clone())).unwrap();

        root.start();
        assert_eq!(root.state(), LifecycleState::Running);
        assert_eq!(child.state(), LifecycleState::Running);

        root.stop();
        assert_eq!(child.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_router_behind_plain_handler_is_cycle_checked() {
        let a = Arc::new(Router::new("a"));
        let b = Arc::new(Router::new("b"));

        let err = a
            .attach(Some("/loop"), Target::shared(a.clone()))
            .unwrap_err();
        assert!(matches!(err, AttachError::CyclicAttachment { .. }));

        a.attach(Some("/b"), Target::shared(b.clone())).unwrap();
        let err = b.attach_default(Target::router(a.clone())).unwrap_err();
        assert!(matches!(err, AttachError::CyclicAttachment { .. }));
        assert_eq!(b.route_count(), 0);
    }

    #[test]
    fn test_loop_through_closure_ends_in_fault() {
        let router = Arc::new(Router::new("root"));
        let inner = router.clone();
        router
            .attach(None, Target::handler(handler_fn(move |ex| inner.handle(ex))))
            .unwrap();

        let mut ex = Exchange::new(Request::get("/anything"));
        let err = router.handle(&mut ex).unwrap_err();
        assert!(err.is_handler_fault());

        // The nesting counter unwinds with the stack.
        router.clear();
        router.attach(Some("/ok"), tagged("ok")).unwrap();
        let mut ex = Exchange::new(Request::get("/ok"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"ok");
    }

    #[test]
    fn test_cycle_check_walks_shared_subtrees_once() {
        let routers: Vec<Arc<Router>> = (0..40)
            .map(|i| Arc::new(Router::new(format!("r{}", i))))
            .collect();
        for pair in routers.windows(2) {
            pair[0].attach(Some("/l"), Target::router(pair[1].clone())).unwrap();
            pair[0].attach(Some("/r"), Target::router(pair[1].clone())).unwrap();
        }

        let top = Arc::new(Router::new("top"));
        top.attach(Some("/down"), Target::router(routers[0].clone())).unwrap();

        let err = routers[39]
            .attach(Some("/up"), Target::router(top.clone()))
            .unwrap_err();
        assert!(matches!(err, AttachError::CyclicAttachment { .. }));
    }

    #[test]
    fn test_case_insensitive_router() {
        let router = Router::new("root");
        router.set_case_sensitive(false);
        router.attach(Some("/Users/{id}"), tagged("user")).unwrap();

        let mut ex = Exchange::new(Request::get("/users/7"));
        router.handle(&mut ex).unwrap();
        assert_eq!(body(&ex), b"user");
        assert_eq!(ex.request.attributes().get_str("id"), Some("7"));

        let strict = Router::with_settings("strict", RouterSettings::default());
        strict.attach(Some("/Users/{id}"), tagged("user")).unwrap();
        let mut ex = Exchange::new(Request::get("/users/7"));
        assert!(strict.handle(&mut ex).unwrap_err().is_no_route());
    }

    #[test]
    fn test_threshold_and_mode_swap_with_routes() {
        let fresh = Router::with_settings(
            "fresh",
            RouterSettings {
                threshold: 0.9,
                mode: RoutingMode::First,
                ..RouterSettings::default()
            },
        );
        fresh.attach(Some("/a"), tagged("a")).unwrap();

        let live = Router::new("live");
        live.adopt(&fresh);
        assert_eq!(live.threshold(), 0.9);
        assert_eq!(live.mode().name(), "first");
        assert_eq!(live.route_count(), 1);
    }
}
