//! Error types for DRLVis
//!
//! Three failure classes reach callers:
//! - missing data (`NotFound`): only ever seen by code that talks to a store
//!   directly; the query engine turns it into an empty result
//! - malformed input (`InvalidInput`, `ShapeMismatch`, `MissingPriorEpisode`):
//!   rejected by the recorder before anything is written
//! - store unavailable (`StoreUnavailable`): fatal when a run is opened

use thiserror::Error;

use crate::taxonomy::Category;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// DRLVis error types
#[derive(Error, Debug)]
pub enum Error {
    /// Caller passed values the encoder cannot log
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Matrix or vector dimensions do not line up
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What was being validated
        context: String,
        /// Expected dimension(s)
        expected: String,
        /// Received dimension(s)
        actual: String,
    },

    /// Action divergence needs the previous episode's probabilities
    #[error("Action divergence for episode {episode} needs the previous episode's probabilities\nThere is no divergence for the first episode; skip the call instead")]
    MissingPriorEpisode {
        /// Episode the divergence was requested for
        episode: u64,
    },

    /// Tag or category absent from the store
    #[error("No data logged under tag '{tag}' in category '{category}'")]
    NotFound {
        /// Category that was searched
        category: Category,
        /// Tag that was requested
        tag: String,
    },

    /// Run directory cannot be opened or reloaded
    #[error("Event store unavailable: {0}\nCheck that the log directory exists and is readable")]
    StoreUnavailable(String),

    /// Segment encode/decode error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Frame could not be encoded as PNG
    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),

    /// Route or route parameter could not be parsed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload body could not be encoded
    #[error("Payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),

    /// Payload body could not be decoded
    #[error("Payload decode error: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),
}

impl Error {
    /// Whether this error only means "nothing was logged here".
    #[must_use]
    pub const fn is_missing_data(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
