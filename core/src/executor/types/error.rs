use thiserror::Error;

use crate::phase::PhaseId;

/// Message recorded on phases that were running when a run was cancelled.
pub const CANCELLED_MESSAGE: &str = "Phase execution was cancelled";

/// Why a run did not complete every phase.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Cannot run phase \"{title}\" because its dependency \"{dependency_title}\" has not completed successfully")]
    DependencyNotSatisfied {
        phase: PhaseId,
        title: String,
        dependency: PhaseId,
        dependency_title: String,
    },

    #[error("Phase \"{title}\" failed: {message}")]
    InvocationFailed {
        phase: PhaseId,
        title: String,
        message: String,
    },

    #[error("Phase execution was cancelled")]
    Cancelled,

    #[error("Failed to run all phases. Could not resolve dependencies for: {}", .remaining.join(", "))]
    UnsatisfiableGraph { remaining: Vec<String> },
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The phase the error is attributed to, if any.
    pub fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::DependencyNotSatisfied { phase, .. } | Self::InvocationFailed { phase, .. } => {
                Some(*phase)
            }
            Self::Cancelled | Self::UnsatisfiableGraph { .. } => None,
        }
    }

    /// Short machine-readable code, used by the JSONL renderer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DependencyNotSatisfied { .. } => "dependency_not_satisfied",
            Self::InvocationFailed { .. } => "invocation_failed",
            Self::Cancelled => "cancelled",
            Self::UnsatisfiableGraph { .. } => "unsatisfiable_graph",
        }
    }
}
