//! Error types for evform-core.

use thiserror::Error;

/// Result type alias for evform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types. All of these are construction-time configuration
/// failures; per-readout data problems are surfaced as counters instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Matcher plane ids collide or fall in the reserved range.
    #[error("invalid plane pair: {a} / {b} (must differ and be below the reserved ids)")]
    InvalidPlanePair { a: u8, b: u8 },

    /// A latency bound of zero would force a decision on every item
    /// immediately and defeat the reordering buffer.
    #[error("latency bound must be greater than zero")]
    ZeroLatency,

    /// Generic configuration error with a descriptive message.
    #[error("configuration error: {0}")]
    Config(String),
}
