//! Lifecycle state machine for a monitoring run.
//!
//! IDLE → RUNNING → STOPPING → JOINED
//!
//! The machine only moves forward; a finished monitor is not restarted.

use crate::error::{JumpError, JumpResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Configured, no workers spawned yet.
    #[default]
    Idle,
    /// Workers spawned and polling.
    Running,
    /// Shutdown signalled; waiting for workers to exit.
    Stopping,
    /// All workers joined; resources released.
    Joined,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Joined => write!(f, "JOINED"),
        }
    }
}

impl LifecycleState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::{Idle, Joined, Running, Stopping};

        matches!(
            (self, target),
            (Idle, Running) | (Running, Stopping) | (Stopping, Joined)
        )
    }

    /// Returns true while workers may still be polling.
    #[must_use]
    pub fn has_live_workers(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: LifecycleState,
    previous: Option<LifecycleState>,
    transition_count: u64,
}

impl StateMachine {
    /// Create a new state machine starting in IDLE.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<LifecycleState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    ///
    /// # Errors
    ///
    /// Returns [`JumpError::InvalidStateTransition`] if `target` is not the
    /// next state.
    pub fn transition(&mut self, target: LifecycleState) -> JumpResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(JumpError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
