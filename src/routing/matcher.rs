//! Route scoring strategies.
//!
//! # Responsibilities
//! - Score a request against a protocol capability set (binary)
//! - Score a request against a compiled URI template (graded)
//! - Keep the template match from the scoring pass so dispatch never re-matches
//!
//! # Scoring
//! ```text
//! protocol:  unknown → 0.0, supported → 1.0, otherwise → 0.0
//! template:  mismatch → 0.0
//!            empty input → 1.0
//!            otherwise → FLOOR + (1 - FLOOR) * (matched + literal) / (2 * total)
//! ```
//! `matched` is the number of bytes the template consumed, `literal` the
//! number of those that were literal text, `total` the length of the
//! remaining part. Binding a variable to text instead of spelling that text
//! out can only lower `literal`, so a more specific template never scores
//! below a less specific one on the same input.
//!
//! # Design Decisions
//! - Scoring never fails; an unparsable request scores 0.0
//! - A successful template match always reaches `MATCH_FLOOR`, so routers
//!   with the default threshold accept any structural match

use crate::exchange::{Protocol, Request};
use crate::routing::template::{
    CompiledTemplate, MatchOptions, MatchingMode, Template, TemplateError, TemplateMatch,
};

/// Lowest score a successful template match can produce.
pub const MATCH_FLOOR: f32 = 0.5;

/// Matching criteria of a route.
#[derive(Debug, Clone)]
pub enum MatchKind {
    Protocol(ProtocolMatcher),
    Template(TemplateMatcher),
}

/// Score for one route plus whatever dispatch needs to commit it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub score: f32,
    pub(crate) matched: Option<TemplateMatch>,
}

impl Evaluation {
    pub(crate) fn miss() -> Self {
        Self {
            score: 0.0,
            matched: None,
        }
    }

    /// Template bindings found while scoring, if any.
    pub fn bindings(&self) -> &[(String, String)] {
        self.matched
            .as_ref()
            .map(|m| m.variables.as_slice())
            .unwrap_or_default()
    }
}

impl MatchKind {
    pub fn evaluate(&self, request: &Request) -> Evaluation {
        match self {
            MatchKind::Protocol(m) => Evaluation {
                score: m.score(request),
                matched: None,
            },
            MatchKind::Template(m) => m.evaluate(request),
        }
    }

    pub fn variable_count(&self) -> usize {
        match self {
            MatchKind::Protocol(_) => 0,
            MatchKind::Template(m) => m.template().variable_count(),
        }
    }
}

/// Binary protocol capability match.
#[derive(Debug, Clone)]
pub struct ProtocolMatcher {
    protocols: Vec<Protocol>,
}

impl ProtocolMatcher {
    pub fn new(protocols: impl IntoIterator<Item = Protocol>) -> Self {
        let mut list: Vec<Protocol> = Vec::new();
        for p in protocols {
            if !list.contains(&p) {
                list.push(p);
            }
        }
        Self { protocols: list }
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    pub fn score(&self, request: &Request) -> f32 {
        match request.protocol() {
            Some(p) if self.protocols.contains(&p) => 1.0,
            _ => 0.0,
        }
    }
}

/// Structural match of the remaining part against a URI template.
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    compiled: CompiledTemplate,
    matching_query: bool,
}

impl TemplateMatcher {
    pub fn new(
        template: &Template,
        options: MatchOptions,
        matching_query: bool,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            compiled: template.compile(options)?,
            matching_query,
        })
    }

    pub fn template(&self) -> &Template {
        self.compiled.template()
    }

    pub fn mode(&self) -> MatchingMode {
        self.compiled.options().mode
    }

    pub fn evaluate(&self, request: &Request) -> Evaluation {
        let Some(remaining) = request.remaining_part(self.matching_query) else {
            return Evaluation::miss();
        };
        match self.compiled.matches(&remaining) {
            Some(m) => Evaluation {
                score: template_score(
                    m.matched_len,
                    self.compiled.template().literal_len(),
                    remaining.len(),
                ),
                matched: Some(m),
            },
            None => Evaluation::miss(),
        }
    }
}

/// Score a successful template match.
pub fn template_score(matched_len: usize, literal_len: usize, total_len: usize) -> f32 {
    if total_len == 0 {
        return 1.0;
    }
    let matched = matched_len.min(total_len);
    let literal = literal_len.min(matched);
    let quality = (matched + literal) as f32 / (2 * total_len) as f32;
    (MATCH_FLOOR + (1.0 - MATCH_FLOOR) * quality).clamp(0.0, 1.0)
}
