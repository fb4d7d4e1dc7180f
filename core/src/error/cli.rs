use thiserror::Error;

use super::error::{ConfigError, RegistryError};
use super::executor::EngineError;

/// Top-level error of the `phaseforge` binary.
///
/// A run that ends with failed phases is not an error; it is reported
/// through the exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid arguments: {0}")]
    Usage(String),

    #[error("invoker setup failed: {0}")]
    Invoker(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// 11 config/registry/usage, 20 io and logging, 50 internal.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Registry(_) | CliError::Usage(_) => 11,
            CliError::Engine(EngineError::Registry(_)) => 11,
            CliError::Engine(EngineError::UnknownPhase(_)) => 11,
            CliError::Io(_) | CliError::Logging(_) => 20,
            CliError::Invoker(_) => 11,
            CliError::Engine(EngineError::RunInProgress) => 50,
        }
    }
}
