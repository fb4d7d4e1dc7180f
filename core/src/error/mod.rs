pub mod cli;
#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;

pub use cli::CliError;
pub use error::{ConfigError, RegistryError};
pub use executor::EngineError;
