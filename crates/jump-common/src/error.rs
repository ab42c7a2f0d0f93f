use thiserror::Error;

/// Monitor error types covering pinning, clock access, and worker lifecycle failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JumpError {
    /// The worker could not be bound exclusively to its CPU.
    #[error("failed to pin worker to CPU {cpu}: {reason}")]
    Pinning {
        /// CPU index the worker was assigned to.
        cpu: usize,
        /// Underlying failure.
        reason: String,
    },

    /// The raw monotonic clock could not be read.
    #[error("monotonic clock unavailable: {0}")]
    Clock(String),

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker for CPU {cpu}: {reason}")]
    Spawn {
        /// CPU index of the worker that could not be started.
        cpu: usize,
        /// Underlying failure.
        reason: String,
    },

    /// Startup bookkeeping could not be allocated.
    #[error("resource exhaustion: {0}")]
    Resource(String),

    /// A worker thread panicked instead of returning.
    #[error("worker for CPU {cpu} panicked")]
    WorkerPanic {
        /// CPU index of the panicked worker.
        cpu: usize,
    },

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl JumpError {
    /// CPU the error is attributed to, if it is worker-specific.
    #[must_use]
    pub fn cpu(&self) -> Option<usize> {
        match self {
            Self::Pinning { cpu, .. } | Self::Spawn { cpu, .. } | Self::WorkerPanic { cpu } => {
                Some(*cpu)
            }
            Self::Clock(_) | Self::Resource(_) | Self::InvalidStateTransition { .. } => None,
        }
    }
}

/// Convenience type alias for monitor operations.
pub type JumpResult<T> = Result<T, JumpError>;
