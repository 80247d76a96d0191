//! Lifecycle state machine for routers.
//!
//! # States
//! ```text
//! Uninitialized → Starting → Running → Stopping → Stopped
//!                    ↑                                │
//!                    └────────────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - Stored in a single atomic; readers never lock
//! - `Running → Starting` is allowed: a re-start recomputes and replaces

use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            4 => LifecycleState::Stopped,
            _ => LifecycleState::Uninitialized,
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    pub(crate) fn set(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Uninitialized);

        lc.set(LifecycleState::Starting);
        lc.set(LifecycleState::Running);
        assert!(lc.is_running());

        lc.set(LifecycleState::Stopped);
        assert_eq!(lc.state(), LifecycleState::Stopped);
        assert_eq!(LifecycleState::from(42), LifecycleState::Uninitialized);
    }
}
