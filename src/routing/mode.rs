//! Selection policies.
//!
//! # Modes
//! - `Best`: highest score wins, earliest attached on ties
//! - `First`: first route at or above the threshold, in attach order
//! - `Last`: last route at or above the threshold
//! - `Next`: round-robin over routes at or above the threshold
//! - `Random`: random among routes at or above the threshold, weighted by score
//! - `Custom`: delegated to a [`RouteSelector`]

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::routing::route::Route;

/// A scored route offered to a custom selector.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub route: &'a Route,
    pub score: f32,
}

/// User-defined selection policy.
pub trait RouteSelector: Send + Sync {
    /// Pick the index of the winning candidate, or `None` for "no route".
    /// Candidates are in attach order and include those below `threshold`.
    fn select(&self, candidates: &[Candidate<'_>], threshold: f32) -> Option<usize>;
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Best,
    First,
    Last,
    Next,
    Random,
    #[serde(skip)]
    Custom(Arc<dyn RouteSelector>),
}

impl RoutingMode {
    pub fn custom(selector: impl RouteSelector + 'static) -> Self {
        RoutingMode::Custom(Arc::new(selector))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoutingMode::Best => "best",
            RoutingMode::First => "first",
            RoutingMode::Last => "last",
            RoutingMode::Next => "next",
            RoutingMode::Random => "random",
            RoutingMode::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick an index from `weights` with probability proportional to weight.
pub(crate) fn weighted_pick(weights: &[f32]) -> Option<usize> {
    let total: f32 = weights.iter().sum();
    if weights.is_empty() || total <= 0.0 {
        return None;
    }
    let mut roll = fastrand::f32() * total;
    for (i, w) in weights.iter().enumerate() {
        if roll < *w {
            return Some(i);
        }
        roll -= w;
    }
    // Rounding left `roll` marginally above the last bucket.
    weights.iter().rposition(|w| *w > 0.0)
}
