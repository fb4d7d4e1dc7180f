//! Phase graph model.
//!
//! ```text
//! PhaseDefinition (TOML / builtin)
//!   ↓
//! PhaseRegistry::from_definitions() → validated, topologically ordered
//!   ↓
//! PhaseGraph { arena: Vec<Arc<Phase>>, index: id -> position }
//! ```

pub mod builtin;
mod graph;
mod registry;
mod types;

pub use graph::PhaseGraph;
pub use registry::{PhaseDefinition, PhaseRegistry};
pub use types::{OutputType, Phase, PhaseId, PhaseStatus};
