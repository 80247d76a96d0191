//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build clients + routing tree → Start routers
//!
//! Reload (startup.rs):
//!     New config → Build tree off to the side → Swap root table → Refresh clients
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Trigger broadcast → Stop accepting → Drain → Stop routers
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routing tree, then listeners
//! - Router state (state.rs) is a single atomic, readable from any thread

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::Shutdown;
pub use startup::{Dispatcher, StartupError};
pub use state::{Lifecycle, LifecycleState};
