//! Error types for agent assembly and session storage

use thiserror::Error;

/// The model/provider configuration could not be resolved.
///
/// Raised while assembling an agent and always propagated to the caller;
/// there is no degraded construction mode.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{provider} credentials missing: set {var}")]
    MissingCredentials {
        provider: &'static str,
        var: &'static str,
    },

    #[error("model name is empty after removing the provider prefix from {raw:?}")]
    EmptyModelName { raw: String },

    #[error("invalid value for header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("failed to load config file {path}: {message}")]
    ConfigFile { path: String, message: String },
}

/// Failures raised by a session storage backend
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Invalid path '{0}': paths must be absolute and must not contain '..'")]
    InvalidPath(String),

    #[error("File '{0}' not found")]
    NotFound(String),

    #[error("Cannot write to {0} because it already exists. Read and then make an edit, or write to a new path.")]
    AlreadyExists(String),

    #[error("String not found in file: {0}")]
    NoMatch(String),

    #[error("String appears {count} times in {path}. Use replace_all or provide more context to make it unique.")]
    AmbiguousMatch { path: String, count: usize },
}
