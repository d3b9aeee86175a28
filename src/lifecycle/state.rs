//! Server state machine.
//!
//! `Constructed → Running → ShuttingDown → Terminated`. Transitions only move
//! forward; repeated or backward requests are ignored, which is what makes a
//! second termination signal a no-op.

use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    /// Listener bound, not yet accepting.
    Constructed,
    /// Accept loop running.
    Running,
    /// Shutdown observed, cleaning up.
    ShuttingDown,
    /// Listener closed and socket file removed.
    Terminated,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerState::Constructed => "constructed",
            ServerState::Running => "running",
            ServerState::ShuttingDown => "shutting-down",
            ServerState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Publishes the current [`ServerState`] over a watch channel.
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<ServerState>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Constructed);
        Self { tx }
    }

    pub fn current(&self) -> ServerState {
        *self.tx.borrow()
    }

    /// Receiver that observes every later transition.
    pub fn watch(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }

    /// Move forward to `next`. Returns `false` if that would not be progress.
    pub fn advance(&self, next: ServerState) -> bool {
        let advanced = self.tx.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        });
        if advanced {
            tracing::debug!(state = %next, "Server state changed");
        }
        advanced
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
