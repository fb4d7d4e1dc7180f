use std::path::PathBuf;

use thiserror::Error;

use crate::phase::PhaseId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHome,
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse error at {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while building or loading a phase registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry has no phases")]
    Empty,

    #[error("Duplicate phase ID: {0}")]
    DuplicatePhaseId(PhaseId),

    #[error("Dependency not found: phase {phase} depends on {missing}")]
    DependencyNotFound { phase: PhaseId, missing: PhaseId },

    #[error("phase {phase} depends on {dependency}, which is registered after it")]
    DependencyOutOfOrder { phase: PhaseId, dependency: PhaseId },

    #[error("phase {phase} lists dependency {dependency} more than once")]
    RepeatedDependency { phase: PhaseId, dependency: PhaseId },

    #[error("phase {0} depends on itself")]
    SelfDependency(PhaseId),

    #[error("registry io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("registry parse error at {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}
