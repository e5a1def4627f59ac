//! Error types for evform-transport.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport error types, all raised at construction time. Runtime data
/// loss (a full queue) is a counter, never an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Queue and pool capacities must be nonzero powers of two so index
    /// arithmetic stays branch-free.
    #[error("slot count must be a nonzero power of two, got {0}")]
    InvalidSlotCount(usize),

    /// Zero-sized slots cannot carry a packet.
    #[error("slot size must be nonzero")]
    InvalidSlotSize,

    /// Generic configuration error with a descriptive message.
    #[error("configuration error: {0}")]
    Config(String),
}
