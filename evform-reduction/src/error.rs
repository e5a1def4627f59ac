//! Error types for evform-reduction.

use thiserror::Error;

/// Result type alias for reduction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reduction error types. All variants are raised at construction or
/// configuration time; once a pipeline is built, data problems are counters.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid core parameter (plane pair, latency bound).
    #[error(transparent)]
    Core(#[from] evform_core::Error),

    /// Configuration document failed to parse.
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("configuration file error: {0}")]
    Io(#[from] std::io::Error),

    /// Semantically invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
