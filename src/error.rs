//! Error types for the PDF extraction library.
//!
//! This module defines all error types that can occur while reading the
//! object layer, instantiating fonts, and interpreting content streams.

/// Result type alias for PDF library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed syntax at a specific byte offset
    #[error("Syntax error at byte {offset}: {reason}")]
    Syntax {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// A required value is missing or out of range
    #[error("Invalid value: {0}")]
    Value(String),

    /// A helper coercion found the wrong object kind after resolution
    #[error("Invalid object type: expected {expected}, found {found}")]
    Type {
        /// Expected object type
        expected: &'static str,
        /// Actual object type found
        found: &'static str,
    },

    /// The document declares encryption, which is not implemented
    #[error("Encrypted documents are not supported")]
    EncryptedNotSupported,

    /// Font instantiation or lookup error
    #[error("Font error: {0}")]
    Font(String),

    /// A named resource (font id, xobject id) is missing at the site of use
    #[error("Resource error: {0}")]
    Resource(String),

    /// Content-stream interpreter error
    #[error("Interpreter error: {0}")]
    Interpreter(String),

    /// No Unicode mapping exists for a character id
    #[error("No Unicode mapping for CID {cid} (encoding {encoding:?})")]
    UnicodeNotDefined {
        /// CID encoding name, if the font carries one
        encoding: Option<String>,
        /// The character id that failed to map
        cid: u32,
    },

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
