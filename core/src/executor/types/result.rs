use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::{PhaseGraph, PhaseStatus};

use super::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Sequential,
    Parallel,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one sequential or parallel run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    /// True only when every phase completed.
    pub success: bool,
    pub error: Option<RunError>,
    /// Phase table as committed when the run ended.
    pub phases: PhaseGraph,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.phases.count_with_status(PhaseStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.phases.count_with_status(PhaseStatus::Failed)
    }

    pub fn pending(&self) -> usize {
        self.phases.count_with_status(PhaseStatus::Pending)
    }

    pub fn was_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(RunError::is_cancelled)
    }

    /// The single human-readable error for the run.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            mode: self.mode,
            success: self.success,
            started_at: self.started_at,
            total: self.phases.len(),
            completed: self.completed(),
            failed: self.failed(),
            pending: self.pending(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            error_code: self.error.as_ref().map(|e| e.code().to_string()),
            error: self.error_message(),
        }
    }
}

/// Serializable counts for renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
