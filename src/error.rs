//! Error taxonomy for WOFF2 decoding.
//!
//! A flat, non-hierarchical set of error kinds. All errors are fatal to the
//! decode: there is no retry and no partial output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Woff2Error {
    #[error("truncated input at offset {offset}")]
    Truncated { offset: usize },

    #[error("bad WOFF2 signature")]
    BadSignature,

    #[error("font collections (TTC) are not supported")]
    UnsupportedCollection,

    #[error("header length {declared} exceeds input length {actual}")]
    InvalidLength { declared: u32, actual: usize },

    #[error("zero-length block has a non-zero offset")]
    InconsistentBlockOffset,

    #[error("malformed variable-length integer at offset {offset}")]
    MalformedVarInt { offset: usize },

    #[error("table directory entry references unknown tag index")]
    UnknownTag,

    #[error("glyf/loca coupling violated: {0}")]
    CouplingViolation(&'static str),

    #[error("decompressed size {actual} does not match declared size {expected}")]
    DecompressedSizeMismatch { expected: usize, actual: usize },

    #[error("glyf sub-stream sizes do not partition the transformed table")]
    SubStreamSizeMismatch,

    #[error("malformed font data: {0}")]
    Malformed(&'static str),

    #[error("unsupported transformation on table {tag}")]
    UnsupportedTransformation { tag: String },
}

impl From<bytes::TryGetError> for Woff2Error {
    fn from(_: bytes::TryGetError) -> Self {
        Woff2Error::Truncated { offset: 0 }
    }
}

pub(crate) fn usize_will_overflow(a: usize, b: usize) -> bool {
    a.checked_add(b).is_none()
}

pub(crate) fn u32_will_overflow(a: u32, b: u32) -> bool {
    a.checked_add(b).is_none()
}
