#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use phaseforge_core::executor::{
    EngineEvent, EventSink, InvokeOutcome, InvokeRequest, InvokeResult, PhaseEngine,
    PhaseInvoker,
};
use phaseforge_core::phase::{Phase, PhaseGraph, PhaseId, PhaseRegistry};

/// What the fake invoker does for one phase.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(String),
    Fail(String),
    /// Never finishes on its own; returns `Aborted` once the run is cancelled.
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    delay: Duration,
    behavior: Behavior,
}

/// Scripted invoker that records call order, inputs and concurrency.
///
/// Unscripted phases succeed immediately with output `out-<id>`.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<PhaseId, Script>>,
    calls: Mutex<Vec<PhaseId>>,
    inputs: Mutex<HashMap<PhaseId, String>>,
    active: Arc<Mutex<HashSet<PhaseId>>>,
    /// For each call, the phases already in flight when it started.
    overlaps: Mutex<Vec<(PhaseId, Vec<PhaseId>)>>,
    max_active: Mutex<usize>,
}

struct ActiveGuard {
    id: PhaseId,
    active: Arc<Mutex<HashSet<PhaseId>>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().unwrap().remove(&self.id);
    }
}

impl ScriptedInvoker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, id: u32, delay_ms: u64, behavior: Behavior) {
        self.scripts.lock().unwrap().insert(
            PhaseId(id),
            Script {
                delay: Duration::from_millis(delay_ms),
                behavior,
            },
        );
    }

    pub fn calls(&self) -> Vec<PhaseId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, id: u32) -> usize {
        self.calls().iter().filter(|c| **c == PhaseId(id)).count()
    }

    pub fn input_of(&self, id: u32) -> Option<String> {
        self.inputs.lock().unwrap().get(&PhaseId(id)).cloned()
    }

    pub fn overlaps(&self) -> Vec<(PhaseId, Vec<PhaseId>)> {
        self.overlaps.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        *self.max_active.lock().unwrap()
    }
}

#[async_trait]
impl PhaseInvoker for ScriptedInvoker {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: InvokeRequest) -> InvokeOutcome {
        let id = request.phase_id;
        self.calls.lock().unwrap().push(id);
        self.inputs
            .lock()
            .unwrap()
            .insert(id, request.composed_input.clone());

        let _guard = {
            let mut active = self.active.lock().unwrap();
            let mut others: Vec<PhaseId> = active.iter().copied().collect();
            others.sort();
            self.overlaps.lock().unwrap().push((id, others));
            active.insert(id);
            let mut max = self.max_active.lock().unwrap();
            *max = (*max).max(active.len());
            ActiveGuard {
                id,
                active: Arc::clone(&self.active),
            }
        };

        let script = self.scripts.lock().unwrap().get(&id).cloned();
        let Some(script) = script else {
            return InvokeOutcome::Success(InvokeResult::new(
                format!("out-{}", id),
                Duration::from_millis(1),
            ));
        };

        if !script.delay.is_zero() {
            tokio::select! {
                _ = request.cancel.cancelled() => return InvokeOutcome::Aborted,
                _ = tokio::time::sleep(script.delay) => {}
            }
        }

        match script.behavior {
            Behavior::Succeed(output) => {
                InvokeOutcome::Success(InvokeResult::new(output, script.delay))
            }
            Behavior::Fail(message) => InvokeOutcome::Failure { message },
            Behavior::Hang => {
                request.cancel.cancelled().await;
                InvokeOutcome::Aborted
            }
        }
    }
}

/// Sink that keeps every event in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(EngineEvent::kind).collect()
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn emit(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Build a graph from `(id, deps)` pairs in registration order.
///
/// Titles are `P<id>` and prompts `prompt <id>`.
pub fn graph(shape: &[(u32, &[u32])]) -> PhaseGraph {
    let phases = shape
        .iter()
        .map(|(id, deps)| {
            Phase::new(*id, format!("P{}", id))
                .with_prompt(format!("prompt {}", id))
                .with_dependencies(deps.iter().copied())
        })
        .collect();
    PhaseRegistry::from_phases(phases)
        .expect("test graph must be valid")
        .into_graph()
}

pub fn engine(graph: PhaseGraph, invoker: Arc<ScriptedInvoker>) -> PhaseEngine {
    PhaseEngine::builder(graph, invoker)
        .model("test-model")
        .initial_input("seed")
        .build()
}

pub fn engine_with_sink(
    graph: PhaseGraph,
    invoker: Arc<ScriptedInvoker>,
    sink: Arc<RecordingSink>,
) -> PhaseEngine {
    PhaseEngine::builder(graph, invoker)
        .model("test-model")
        .initial_input("seed")
        .sink(sink)
        .build()
}
