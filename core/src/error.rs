//! Error types for the conversion backend.
//!
//! Engines report `EngineError`; the backend wraps those with the family and
//! the step that failed (`BackendError`). Lifecycle misuse of the backend slot
//! and configuration I/O have their own enums.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::Family;

/// Failure reported by a conversion engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("system data directory {0:?} does not exist")]
    MissingData(PathBuf),
    #[error("engine returned a null {0}")]
    NullHandle(&'static str),
    #[error("engine rejected {0}")]
    Rejected(&'static str),
    #[error("user dictionary storage: {0}")]
    Storage(#[from] redb::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure surfaced by `ConversionBackend` operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to initialise the {family} context")]
    ContextInit {
        family: Family,
        #[source]
        source: EngineError,
    },
    #[error("failed to allocate a {family} instance")]
    InstanceAlloc {
        family: Family,
        #[source]
        source: EngineError,
    },
    #[error("failed to save user data for {}", describe_failures(.failures))]
    Save { failures: Vec<(Family, EngineError)> },
}

impl BackendError {
    /// Families whose save failed, empty for every other variant.
    pub fn failed_families(&self) -> Vec<Family> {
        match self {
            BackendError::Save { failures } => failures.iter().map(|(family, _)| *family).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe_failures(failures: &[(Family, EngineError)]) -> String {
    failures
        .iter()
        .map(|(family, err)| format!("{} ({})", family, err))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Misuse of the single live backend slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("a backend is already initialised; finalize it first")]
    AlreadyInitialized,
    #[error("no backend is initialised")]
    NotInitialized,
}

/// Reading or writing a TOML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    /// The file is simply absent, which is not a configuration problem.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}
