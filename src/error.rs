//! Error types for run-recorder
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Tracking error types
#[derive(Error, Debug)]
pub enum Error {
    /// Tracking configuration is invalid (URI, timeout, credentials)
    #[error("Invalid tracking configuration: {0}")]
    Config(String),

    /// Transport failure talking to the tracking server
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracking server rejected a request
    #[error("Tracking API error ({status}): {code}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Backend error code (e.g. `RESOURCE_DOES_NOT_EXIST`)
        code: String,
        /// Backend error message
        message: String,
    },

    /// Run does not exist in the backend
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Experiment does not exist in the backend
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// Artifact URI uses a scheme this client cannot upload to
    #[error("Unsupported artifact URI: {0}\nSupported schemes: file:, mlflow-artifacts:")]
    UnsupportedArtifactUri(String),

    /// Caller supplied an unusable key, path or value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this is a backend "does not exist" response.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::RunNotFound(_) | Self::ExperimentNotFound(_) => true,
            Self::Api { status, code, .. } => *status == 404 || code == "RESOURCE_DOES_NOT_EXIST",
            _ => false,
        }
    }
}
