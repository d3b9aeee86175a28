//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → background task → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop dropped → gateway aborted → socket file removed
//!
//! State (state.rs):
//!     Constructed → Running → ShuttingDown → Terminated
//! ```
//!
//! # Design Decisions
//! - Signal handling stays at the process boundary; the server only sees a
//!   shutdown coordinator
//! - Shutdown is coarse: in-flight requests are abandoned, not drained
//! - Only the first signal matters

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::Shutdown;
pub use signals::TerminationSignals;
pub use state::{ServerState, StateTracker};
