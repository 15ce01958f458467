//! Fatal, connection-ending errors produced by the token layer.
//!
//! Malformed bytes at this layer can never be recovered from by
//! discarding one frame, because the byte stream itself is
//! desynchronized. `banana-core` wraps these one-for-one into its own
//! `BananaError` via `#[from]`.

use thiserror::Error;

/// Errors raised while decoding the raw token stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A token's header grew past the configured prefix limit without
    /// terminating in a type byte.
    #[error("token prefix is limited to {limit} bytes")]
    PrefixLimitExceeded {
        /// The limit that was exceeded.
        limit: usize,
    },

    /// A type byte did not match any entry in the fixed type-byte mapping.
    #[error("unknown type byte {byte:#04x}")]
    UnknownTypeByte {
        /// The offending byte.
        byte: u8,
    },

    /// A header's numeric value doesn't fit in `u64` for a field that
    /// isn't allowed full arbitrary precision (lengths, counts, vocab
    /// indices).
    #[error("header value exceeds u64 range")]
    HeaderValueOverflow,

    /// Decoded `Utf8` text token contained invalid UTF-8.
    #[error("STRING token is not valid UTF-8")]
    InvalidUtf8,

    /// A vocabulary-encoded token referenced an index that isn't present
    /// in the relevant direction's vocab table.
    #[error("vocab index {index} is not registered")]
    UnknownVocabIndex {
        /// The index that was referenced.
        index: u64,
    },
}

/// Convenience alias for token-layer results.
pub type Result<T> = std::result::Result<T, WireError>;
