//! Error types for MARC to BIBFRAME conversion.
//!
//! This module provides the [`ConvertError`] type for all conversion operations
//! and the [`Result`] convenience type.
//!
//! Only some of these errors ever leave the record pipeline. Malformed `$6`
//! linkage and statements the store refuses are logged and skipped where they
//! occur; collaborator (plugin hook) failures propagate and abort the run.

use thiserror::Error;

/// Error type for all conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// A `$6` linkage value that is not of the form `TAG-SEQ[/lang]`.
    #[error("Malformed linkage: {0}")]
    MalformedLinkage(String),

    /// A statement the statement store refused to add.
    #[error("Unrepresentable statement: {0}")]
    UnrepresentableStatement(String),

    /// A plugin hook failed.
    #[error("{stage} hook failed: {message}")]
    Collaborator {
        /// Pipeline stage whose hook failed.
        stage: &'static str,
        /// Message reported by the hook.
        message: String,
    },

    /// Invalid converter configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error while encoding statements or entity data as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error from the output sink.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A run stopped on an error after completing some records.
    #[error("Run aborted after {completed} record(s): {source}")]
    Aborted {
        /// Number of records fully processed before the failure.
        completed: usize,
        /// The failure that stopped the run.
        source: Box<ConvertError>,
    },
}

impl ConvertError {
    /// Builds a collaborator failure for the given stage.
    pub fn collaborator(stage: &'static str, message: impl Into<String>) -> Self {
        ConvertError::Collaborator {
            stage,
            message: message.into(),
        }
    }
}

/// Convenience type alias for [`std::result::Result`] with [`ConvertError`].
pub type Result<T> = std::result::Result<T, ConvertError>;
