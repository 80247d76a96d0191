//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange (request remaining part, protocol)
//!     → router.rs (load route snapshot, apply routing mode)
//!     → route.rs + matcher.rs (score each candidate in [0, 1])
//!     → winner: bind template variables, advance base, invoke target
//!     → no winner: default target, else NoRouteMatched
//!
//! Attach/detach (any thread, any time):
//!     template.rs (parse + compile) → route.rs → copy-on-write snapshot swap
//! ```
//!
//! # Design Decisions
//! - Templates compile to anchored regexes once, at attach time
//! - Scores depend only on the route and the request, never on the threshold
//! - Deterministic for `Best`, `First` and `Last`: same snapshot, same input,
//!   same route

pub mod matcher;
pub mod mode;
pub mod route;
pub mod router;
pub mod template;

pub use matcher::{Evaluation, MatchKind, ProtocolMatcher, TemplateMatcher, MATCH_FLOOR};
pub use mode::{Candidate, RouteSelector, RoutingMode};
pub use route::{Route, RouteId};
pub use router::{Router, RouterSettings, Selection, DEFAULT_THRESHOLD};
pub use template::{
    MatchOptions, MatchingMode, Template, TemplateError, TemplateMatch, VariableKind,
};
