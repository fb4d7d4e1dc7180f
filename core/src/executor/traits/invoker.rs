use std::time::Duration;

use async_trait::async_trait;

use crate::executor::cancel::CancelSignal;
use crate::phase::{OutputType, PhaseId};

/// One generation call.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub model: String,
    pub phase_id: PhaseId,
    pub composed_input: String,
    pub file_path: Option<String>,
    pub output_type: Option<OutputType>,
    /// The run's cancellation signal. Invokers should stop promptly and
    /// return [`InvokeOutcome::Aborted`] once it fires.
    pub cancel: CancelSignal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResult {
    pub output: String,
    pub duration: Duration,
    pub tokens_per_second: Option<f64>,
}

impl InvokeResult {
    pub fn new(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            output: output.into(),
            duration,
            tokens_per_second: None,
        }
    }
}

/// Tagged result of an invocation. Failure is data, never an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Success(InvokeResult),
    Failure { message: String },
    Aborted,
}

impl InvokeOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Performs the actual generation work for a phase.
#[async_trait]
pub trait PhaseInvoker: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, request: InvokeRequest) -> InvokeOutcome;
}
