use std::time::Duration;

use crate::executor::types::{RunMode, RunSummary};
use crate::phase::PhaseId;

/// Receives engine events (progress bars, text or JSONL renderers).
///
/// Sinks observe; they never influence scheduling.
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;
    fn emit(&self, event: &EngineEvent);
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    RunStart {
        run_id: String,
        mode: RunMode,
        total_phases: usize,
    },
    PhaseStart {
        run_id: String,
        phase_id: PhaseId,
        title: String,
    },
    PhaseComplete {
        run_id: String,
        phase_id: PhaseId,
        title: String,
        duration: Duration,
        output: String,
        tokens_per_second: Option<f64>,
    },
    PhaseFailed {
        run_id: String,
        phase_id: PhaseId,
        title: String,
        message: String,
    },
    RunEnd {
        run_id: String,
        summary: RunSummary,
    },
}

impl EngineEvent {
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStart { run_id, .. }
            | Self::PhaseStart { run_id, .. }
            | Self::PhaseComplete { run_id, .. }
            | Self::PhaseFailed { run_id, .. }
            | Self::RunEnd { run_id, .. } => run_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run.start",
            Self::PhaseStart { .. } => "phase.start",
            Self::PhaseComplete { .. } => "phase.complete",
            Self::PhaseFailed { .. } => "phase.failed",
            Self::RunEnd { .. } => "run.end",
        }
    }
}
