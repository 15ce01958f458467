//! The fixed type-byte mapping and the `Token` value produced by decode.
//!
//! This is a fixed, bijective assignment of one byte per token kind
//! (see `DESIGN.md` for the full table and why it was chosen).

use num_bigint::BigUint;

use crate::error::WireError;

/// Non-negative integer body, type byte `0x81`.
pub const TYPE_INT: u8 = 0x81;
/// IEEE-754 double, type byte `0x82`, no header.
pub const TYPE_FLOAT: u8 = 0x82;
/// Raw byte string, length-prefixed, type byte `0x83`.
pub const TYPE_BYTES: u8 = 0x83;
/// Negative integer body (magnitude only; sign is implied), type byte `0x84`.
pub const TYPE_NEG: u8 = 0x84;
/// Vocabulary-encoded byte string, index-prefixed, type byte `0x85`.
pub const TYPE_BVOCAB: u8 = 0x85;
/// UTF-8 text, length-prefixed, type byte `0x87`.
pub const TYPE_STRING: u8 = 0x87;
/// Vocabulary-encoded text, index-prefixed, type byte `0x88`.
pub const TYPE_SVOCAB: u8 = 0x88;
/// Begin a composite frame, count-prefixed, type byte `0x89`.
pub const TYPE_OPEN: u8 = 0x89;
/// End a composite frame, count-prefixed, type byte `0x8A`.
pub const TYPE_CLOSE: u8 = 0x8A;
/// Cancel the innermost open frame, type byte `0x8B`.
pub const TYPE_ABORT: u8 = 0x8B;
/// Fatal protocol-level error message, length-prefixed, type byte `0x8C`.
pub const TYPE_ERROR: u8 = 0x8C;

/// Returns whether `byte` is a valid type byte under the fixed mapping.
#[must_use]
pub fn is_known_type_byte(byte: u8) -> bool {
    matches!(
        byte,
        TYPE_INT
            | TYPE_FLOAT
            | TYPE_BYTES
            | TYPE_NEG
            | TYPE_BVOCAB
            | TYPE_STRING
            | TYPE_SVOCAB
            | TYPE_OPEN
            | TYPE_CLOSE
            | TYPE_ABORT
            | TYPE_ERROR
    )
}

/// A single decoded primitive token.
///
/// `Bytes`/`Str`/`Svocab`/`Bvocab` carry already-resolved payloads: the
/// decoder consults the incoming vocab table itself before handing a
/// `Token` to its caller, so callers never see a bare vocab index for a
/// string/bytes token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Non-negative integer.
    Int(BigUint),
    /// Negative integer (magnitude; caller applies the sign).
    Neg(BigUint),
    /// IEEE-754 double.
    Float(f64),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Str(String),
    /// Begin a composite frame; payload is the frame's unique count.
    Open(u64),
    /// End a composite frame; payload is the matching count.
    Close(u64),
    /// Abort the innermost open frame.
    Abort,
    /// Fatal protocol-level error message.
    Error(String),
}

/// The type byte a given [`Token`] would be encoded with.
#[must_use]
pub fn type_byte_of(token: &Token) -> u8 {
    match token {
        Token::Int(_) => TYPE_INT,
        Token::Neg(_) => TYPE_NEG,
        Token::Float(_) => TYPE_FLOAT,
        Token::Bytes(_) => TYPE_BYTES,
        Token::Str(_) => TYPE_STRING,
        Token::Open(_) => TYPE_OPEN,
        Token::Close(_) => TYPE_CLOSE,
        Token::Abort => TYPE_ABORT,
        Token::Error(_) => TYPE_ERROR,
    }
}

/// Look up the human name of a type byte, for diagnostics.
#[must_use]
pub fn type_byte_name(byte: u8) -> &'static str {
    match byte {
        TYPE_INT => "INT",
        TYPE_FLOAT => "FLOAT",
        TYPE_BYTES => "BYTES",
        TYPE_NEG => "NEG",
        TYPE_BVOCAB => "BVOCAB",
        TYPE_STRING => "STRING",
        TYPE_SVOCAB => "SVOCAB",
        TYPE_OPEN => "OPEN",
        TYPE_CLOSE => "CLOSE",
        TYPE_ABORT => "ABORT",
        TYPE_ERROR => "ERROR",
        _ => "UNKNOWN",
    }
}

pub(crate) fn checked_type_byte(byte: u8) -> Result<u8, WireError> {
    if is_known_type_byte(byte) { Ok(byte) } else { Err(WireError::UnknownTypeByte { byte }) }
}
