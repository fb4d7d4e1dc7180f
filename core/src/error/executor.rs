use thiserror::Error;

use super::error::RegistryError;
use crate::phase::PhaseId;

/// Engine misuse and configuration errors.
///
/// Generation failures are not errors at this level; they are recorded on the
/// phase and reported through [`RunReport`](crate::executor::RunReport).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown phase ID: {0}")]
    UnknownPhase(PhaseId),

    #[error("a run is already in progress")]
    RunInProgress,

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
