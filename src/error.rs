//! Submodule defining the errors used across the crate.

/// Errors that can occur while encoding, indexing, decoding, or querying a blob.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied argument was invalid (e.g. an unknown encode mode).
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Filesystem or other I/O failure. Surfaced verbatim from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A primitive (varint, bstr, magic, version) could not be parsed.
    #[error("malformed {what} at offset {offset}")]
    Malformed {
        /// What was being parsed when the failure occurred.
        what: String,
        /// Byte offset at which parsing failed.
        offset: usize,
    },

    /// A bit- or byte-unpacking operation ran past the end of its input.
    #[error("truncated: needed {needed} bytes, only {available} available")]
    Truncated {
        /// Number of bytes the operation required.
        needed: usize,
        /// Number of bytes actually available.
        available: usize,
    },

    /// A structural invariant of the blob was violated.
    #[error("corrupt blob: {reason}")]
    Corrupt {
        /// Human-readable description of the violated invariant.
        reason: String,
    },

    /// The external compressor reported a failure.
    #[error("compressor error: {0}")]
    Compressor(String),

    /// Template bank text could not be parsed.
    #[error("invalid template bank: {0}")]
    InvalidTemplateBank(String),
}

impl Error {
    pub(crate) fn malformed(what: impl Into<String>, offset: usize) -> Self {
        Error::Malformed {
            what: what.into(),
            offset,
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::Corrupt {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
