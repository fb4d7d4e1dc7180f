//! Phase execution engine.
//!
//! Runs a [`PhaseGraph`](crate::phase::PhaseGraph) either strictly in
//! registration order or with maximal safe parallelism, writing every status
//! change into a single-writer [`PhaseStore`].
//!
//! # Architecture
//!
//! ```text
//! PhaseRegistry → PhaseGraph
//!   ↓
//! PhaseEngine::builder(graph, invoker).sink(..).build()
//!   ↓
//! run_sequential(&CancelSignal) | run_parallel(&CancelSignal)
//!   ↓  ready phases → compose() → PhaseInvoker::invoke()
//!   ↓  outcomes committed to PhaseStore (watch channel)
//! RunReport { success, error: Option<RunError>, phases, elapsed }
//! ```

mod cancel;
mod engine;
mod progress;
mod scheduler;
mod store;
pub mod traits;
pub mod types;

pub use cancel::CancelSignal;
pub use engine::{PhaseEngine, PhaseEngineBuilder};
pub use progress::ProgressMonitor;
pub use store::PhaseStore;
pub use traits::{EngineEvent, EventSink, InvokeOutcome, InvokeRequest, InvokeResult, PhaseInvoker};
pub use types::{RunError, RunMode, RunReport, RunSummary, CANCELLED_MESSAGE};
