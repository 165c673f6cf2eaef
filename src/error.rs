//! Error types for the mime-info crate.

use std::io;
use thiserror::Error;

/// The main error type for the mime-info crate.
///
/// Only explicit ingestion and persistence failures surface as errors.
/// Everything else (an unparsable magic value, an unreadable file during a
/// lookup, a rejected preferred suffix) is recovered locally: the failed
/// object is neutralized and a warning goes to the diagnostic sink.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed MIME definition XML: unknown element for the current state,
    /// missing required attribute, invalid offset or weight.
    #[error("parse error: {0}")]
    Parse(String),

    /// Error from the underlying XML tokenizer.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed user-modified-types blob.
    #[error("persistence error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Specialized Result type for mime-info operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a parse error tagged with the definition source and byte offset.
    pub(crate) fn parse_at(source_name: &str, position: u64, message: impl Into<String>) -> Self {
        Error::Parse(format!("{}:{}: {}", source_name, position, message.into()))
    }
}
