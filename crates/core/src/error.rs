//! Error types for the solver.
//!
//! Inter-worker communication failure is fatal: every rank's state is needed
//! for a globally consistent next step, so there is no partial-failure
//! recovery path. Pressure-solve non-convergence is deliberately *not* an
//! error; it is a soft failure logged by the driver.

use std::error::Error;
use std::fmt;

/// Errors from the inter-worker communication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    /// A peer's channel endpoint is gone (the worker died or shut down early).
    Disconnected {
        /// Rank of the unreachable peer.
        peer: usize,
    },
    /// A peer sent a message of an unexpected kind, meaning the ranks have
    /// diverged in their collective-operation sequence.
    Protocol {
        /// Rank of the misbehaving peer.
        peer: usize,
        /// Message kind the receiver was waiting for.
        expected: &'static str,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { peer } => write!(f, "worker {peer} disconnected"),
            Self::Protocol { peer, expected } => {
                write!(f, "worker {peer} sent an unexpected message (expected {expected})")
            }
        }
    }
}

impl Error for CommError {}

/// Errors from simulation setup and the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The communication layer failed; the run cannot continue.
    Comm(CommError),
    /// The configuration describes an unusable problem.
    InvalidConfig(String),
    /// A worker thread panicked during a parallel run.
    WorkerPanicked {
        /// Rank of the worker that died.
        rank: usize,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comm(e) => write!(f, "communication failure: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::WorkerPanicked { rank } => write!(f, "worker {rank} panicked"),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Comm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CommError> for SimulationError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}
