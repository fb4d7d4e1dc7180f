use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use crate::error::EngineError;
use crate::phase::{PhaseId, PhaseStatus};

use super::cancel::CancelSignal;
use super::engine::PhaseEngine;
use super::traits::InvokeOutcome;
use super::types::{RunError, CANCELLED_MESSAGE};

type Invocation = BoxFuture<'static, (PhaseId, InvokeOutcome)>;

impl PhaseEngine {
    /// Ready-set scheduling loop for [`run_parallel`](PhaseEngine::run_parallel).
    ///
    /// Readiness is always computed from the latest committed table. Returns
    /// the run error, if any.
    pub(super) async fn schedule_parallel(
        &self,
        run_id: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<RunError>, EngineError> {
        let mut outstanding: FuturesUnordered<Invocation> = FuturesUnordered::new();
        let mut error: Option<RunError> = None;

        loop {
            if cancel.is_cancelled() {
                // Invokers observe the same signal; their futures are dropped.
                drop(outstanding);
                self.fail_running(run_id, CANCELLED_MESSAGE)?;
                return Ok(Some(RunError::Cancelled));
            }

            let graph = self.snapshot();
            if graph.count_with_status(PhaseStatus::Completed) == graph.len() {
                return Ok(None);
            }

            if error.is_none() {
                let mut ready = Vec::new();
                for phase in graph.iter() {
                    if phase.status == PhaseStatus::Pending
                        && graph.all_dependencies_have_status(phase.id, PhaseStatus::Completed)?
                    {
                        ready.push(phase.id);
                    }
                }

                if !ready.is_empty() {
                    tracing::debug!(run_id, phases = ?ready, "launching ready batch");
                    for request in self.mark_running(run_id, &ready, cancel)? {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let invoker = Arc::clone(&self.invoker);
                        let id = request.phase_id;
                        outstanding.push(async move { (id, invoker.invoke(request).await) }.boxed());
                    }
                    if cancel.is_cancelled() {
                        continue;
                    }
                }
            }

            if outstanding.is_empty() {
                if error.is_some() {
                    return Ok(error);
                }
                let remaining: Vec<String> = self
                    .snapshot()
                    .iter()
                    .filter(|p| p.status != PhaseStatus::Completed)
                    .map(|p| p.title.clone())
                    .collect();
                tracing::error!(run_id, ?remaining, "no phase is ready and none is running");
                return Ok(Some(RunError::UnsatisfiableGraph { remaining }));
            }

            let finished = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = outstanding.next() => next,
            };
            let Some((id, outcome)) = finished else {
                continue;
            };

            if let Err(e) = self.settle(run_id, id, outcome)? {
                if error.is_none() {
                    tracing::debug!(
                        run_id,
                        in_flight = outstanding.len(),
                        "no new launches; waiting for in-flight phases"
                    );
                }
                // Most recent failure wins.
                error = Some(e);
            }
        }
    }
}
