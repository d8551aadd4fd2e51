// src/error.rs

//! Crate-wide error type

use thiserror::Error;

/// Errors that can occur while merging archives
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reading an input archive or writing the output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error walking a filesystem-backed archive
    #[error("Failed to walk archive directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Malformed class file (low-level parse failure)
    #[error("Malformed class file: {0}")]
    Malformed(String),

    /// A class could not be processed; names the offending module
    #[error("Error processing class '{class}': {reason}")]
    ClassProcessing { class: String, reason: String },
}

impl Error {
    /// Wrap a lower-level failure with the name of the class being processed.
    pub fn for_class(class: &str, err: Error) -> Error {
        match err {
            Error::ClassProcessing { .. } => err,
            other => Error::ClassProcessing {
                class: class.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
