use derive_more::{Display, Error, From};

/// Failure to decode a single alignment record. The record is skipped, decoding goes on.
#[derive(Debug, Display, Error, From)]
pub enum DecodeError {
    #[display("failed to read the alignment record: {_0}")]
    #[from]
    Io(std::io::Error),
    #[display("malformed attribute {tag}: {reason}")]
    Attribute { tag: &'static str, reason: String },
    #[display("malformed alignment operations: {_0}")]
    Cigar(#[error(not(source))] String),
    #[display("invalid alignment coordinates: {_0}")]
    Coordinates(#[error(not(source))] String),
    #[display("alignment operations need {needed} {what} bases, but only {available} are available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[display("reference lookup failed: {_0}")]
    Reference(#[error(not(source))] String),
}

impl DecodeError {
    pub fn attribute(tag: &'static str, reason: impl Into<String>) -> Self {
        Self::Attribute {
            tag,
            reason: reason.into(),
        }
    }
}
