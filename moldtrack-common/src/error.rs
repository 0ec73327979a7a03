//! Common error types for Moldtrack

use thiserror::Error;

/// Common result type for Moldtrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Moldtrack crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw record cannot be mapped to the canonical shape
    /// (unrecognized timestamp, unsupported payload, ...)
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Canonical record failed strict validation; carries every
    /// structural problem found, not just the first
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dataset download failure (both fetch attempts exhausted)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Failure while ingesting one record of a batch, annotated with
    /// the record's position so the caller can identify it
    #[error("Record {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the index of the batch record that produced it
    pub fn at_record(self, index: usize) -> Error {
        Error::Batch {
            index,
            source: Box::new(self),
        }
    }
}
