use std::time::Duration;

use async_trait::async_trait;

use phaseforge_core::executor::{InvokeOutcome, InvokeRequest, InvokeResult, PhaseInvoker};

/// Offline invoker that returns the composed input as the output.
///
/// Useful for dry runs: every phase succeeds and the final outputs show
/// exactly what each phase would have sent.
#[derive(Debug, Default, Clone)]
pub struct EchoInvoker {
    latency: Duration,
}

impl EchoInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated per-phase latency.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl PhaseInvoker for EchoInvoker {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, request: InvokeRequest) -> InvokeOutcome {
        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = request.cancel.cancelled() => return InvokeOutcome::Aborted,
                _ = tokio::time::sleep(self.latency) => {}
            }
        } else if request.cancel.is_cancelled() {
            return InvokeOutcome::Aborted;
        }

        InvokeOutcome::Success(InvokeResult::new(request.composed_input, self.latency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseforge_core::executor::CancelSignal;
    use phaseforge_core::phase::PhaseId;

    fn request(cancel: CancelSignal) -> InvokeRequest {
        InvokeRequest {
            model: "m".into(),
            phase_id: PhaseId(1),
            composed_input: "prompt text".into(),
            file_path: None,
            output_type: None,
            cancel,
        }
    }

    #[tokio::test]
    async fn echoes_the_composed_input() {
        let outcome = EchoInvoker::new().invoke(request(CancelSignal::new())).await;
        assert_eq!(
            outcome,
            InvokeOutcome::Success(InvokeResult::new("prompt text", Duration::ZERO))
        );
    }

    #[tokio::test]
    async fn respects_cancellation() {
        let cancel = CancelSignal::new();
        cancel.request_cancel();
        let invoker = EchoInvoker::with_latency(Duration::from_secs(10));
        assert_eq!(invoker.invoke(request(cancel)).await, InvokeOutcome::Aborted);
    }
}
