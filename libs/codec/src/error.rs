//! Codec errors for producer frame decoding

use thiserror::Error;

/// Reasons a candidate frame was rejected
#[derive(Debug, Error)]
pub enum CodecError {
    /// Candidate text is not valid JSON
    #[error("Malformed frame ({len} bytes): {source}")]
    Malformed {
        len: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON, but the envelope must be an object
    #[error("Frame is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    /// Buffered remainder grew past the configured cap
    #[error("Frame exceeds maximum size: {size} bytes > {max} bytes")]
    FrameTooLarge { size: usize, max: usize },
}

impl CodecError {
    /// Whether more bytes could still turn this candidate into a valid frame
    pub fn is_incomplete(&self) -> bool {
        match self {
            CodecError::Malformed { source, .. } => source.is_eof(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
