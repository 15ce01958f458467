//! Well-known opentype byte strings.
//!
//! An opentype is one or more tokens following an `OPEN` marker that name
//! the composite's kind. Registries key off `&'static [u8]` slices
//! (single-token opentypes) or `(&'static [u8], &'static [u8])` pairs
//! (the two-token `copyable`/`instance` prefix).

/// `none`
pub const NONE: &[u8] = b"none";
/// `boolean`
pub const BOOLEAN: &[u8] = b"boolean";
/// `reference`
pub const REFERENCE: &[u8] = b"reference";
/// `dict`
pub const DICT: &[u8] = b"dict";
/// `list`
pub const LIST: &[u8] = b"list";
/// `tuple`
pub const TUPLE: &[u8] = b"tuple";
/// `set`
pub const SET: &[u8] = b"set";
/// `immutable-set`
pub const IMMUTABLE_SET: &[u8] = b"immutable-set";
/// `unicode`
pub const UNICODE: &[u8] = b"unicode";
/// `set-vocab`
pub const SET_VOCAB: &[u8] = b"set-vocab";
/// `add-vocab`
pub const ADD_VOCAB: &[u8] = b"add-vocab";
/// `call`
pub const CALL: &[u8] = b"call";
/// `arguments`
pub const ARGUMENTS: &[u8] = b"arguments";
/// `answer`
pub const ANSWER: &[u8] = b"answer";
/// `error`
pub const ERROR: &[u8] = b"error";
/// `my-reference`
pub const MY_REFERENCE: &[u8] = b"my-reference";
/// `your-reference`
pub const YOUR_REFERENCE: &[u8] = b"your-reference";
/// `their-reference`
pub const THEIR_REFERENCE: &[u8] = b"their-reference";
/// `copyable`
pub const COPYABLE: &[u8] = b"copyable";
/// `instance`
pub const INSTANCE: &[u8] = b"instance";
/// `module`
pub const MODULE: &[u8] = b"module";
/// `class`
pub const CLASS: &[u8] = b"class";
/// `method`
pub const METHOD: &[u8] = b"method";
/// `function`
pub const FUNCTION: &[u8] = b"function";
/// `attrdict`
pub const ATTRDICT: &[u8] = b"attrdict";
/// `decimal`
pub const DECIMAL: &[u8] = b"decimal";

/// A decoded opentype: the sequence of byte strings following an `OPEN`
/// marker, before its body tokens.
pub type Opentype = Vec<Vec<u8>>;

/// Build a single-token opentype.
#[must_use]
pub fn single(kind: &[u8]) -> Opentype {
    vec![kind.to_vec()]
}

/// Build the two-token `copyable`/`instance` opentype prefix.
#[must_use]
pub fn with_name(kind: &[u8], name: &str) -> Opentype {
    vec![kind.to_vec(), name.as_bytes().to_vec()]
}
