use thiserror::Error;

/// Errors raised while building or reading a PIX BR Code
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PixError {
    #[error("Field {tag} is {len} bytes, the two digit length prefix allows at most 99")]
    FieldTooLong { tag: String, len: usize },

    #[error("Field {field} contains non-ASCII characters")]
    NonAscii { field: &'static str },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("CRC mismatch: payload declares {declared}, computed {computed}")]
    CrcMismatch { declared: String, computed: String },
}
