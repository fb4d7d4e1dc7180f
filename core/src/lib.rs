//! Dependency-ordered execution of LLM generation phases.
//!
//! A registry of phases forms a DAG; each phase's input is composed from its
//! dependencies' outputs, and the [`executor::PhaseEngine`] runs the graph
//! sequentially or with maximal safe parallelism.

pub mod compose;
pub mod config;
pub mod error;
pub mod executor;
pub mod phase;

pub use compose::{compose, ComposerKind};
pub use error::{CliError, ConfigError, EngineError, RegistryError};
pub use executor::{
    CancelSignal, EngineEvent, EventSink, InvokeOutcome, InvokeRequest, InvokeResult,
    PhaseEngine, PhaseInvoker, RunError, RunMode, RunReport,
};
pub use phase::{Phase, PhaseGraph, PhaseId, PhaseRegistry, PhaseStatus};
