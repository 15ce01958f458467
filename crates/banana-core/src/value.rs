//! The in-memory object graph representation both stacks operate over.
//!
//! Containers are `Rc<RefCell<..>>` rather than plain `Vec`/owned
//! collections: cyclic graphs require a slot to exist before its final
//! contents are known, and Rust has no built-in "immutable after
//! construction, patchable exactly once" container. See `DESIGN.md` for
//! why `List` and `Tuple` share this same backing.

use std::{cell::RefCell, fmt, rc::Rc};

use num_bigint::BigInt;

/// Shared, interior-mutable handle to a container's backing storage.
pub type Shared<T> = Rc<RefCell<T>>;

/// Distinguishes `list` from `tuple` opentypes over an identical backing
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqKind {
    /// Mutable sequence (`list` opentype).
    List,
    /// Mutable-during-decode, conceptually-immutable sequence (`tuple`
    /// opentype).
    Tuple,
}

/// The pickle/reduce protocol number an `instance` frame was encoded
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceProtocol {
    /// Legacy `(function, args)` form. Accepted on decode, never emitted.
    Zero,
    /// `(class, args)` via the class's low-level constructor. Default
    /// emitted protocol.
    Two,
    /// `(class, args, kwargs)`. Accepted on decode, never emitted.
    Four,
}

/// An unsafe-mode instance produced by the reduction protocol.
/// This is opaque data, not a live Rust object: the
/// codec doesn't know how to instantiate arbitrary classes by name, so
/// it carries the reduction tuple's pieces for the caller's own
/// `ClassRegistry` to interpret (see `crate::registry`).
#[derive(Debug, Clone)]
pub struct Instance {
    /// Reduction protocol this instance was encoded/decoded with.
    pub protocol: ReduceProtocol,
    /// Fully-qualified class name, e.g. `"mymodule.MyClass"`.
    pub class_name: String,
    /// Positional constructor arguments.
    pub args: Shared<Vec<Value>>,
    /// Keyword constructor arguments (protocol 4 only).
    pub kwargs: Option<Shared<Vec<(Value, Value)>>>,
    /// Flat alternating key/value state pairs (`__setstate__` input).
    pub state: Shared<Vec<(Value, Value)>>,
    /// Extra list items appended after construction (`listitems` in the
    /// reduce tuple).
    pub list_items: Shared<Vec<Value>>,
    /// Extra dict items merged in after construction (`dictitems`).
    pub dict_items: Shared<Vec<(Value, Value)>>,
}

/// A decimal value, represented as its canonical text rather than a
/// parsed numeric type.
///
/// The codec never performs arithmetic on decimals — it only needs to
/// carry them faithfully, slicing `str(obj)` on encode and unslicing
/// back via the peer's own decimal constructor. Pulling in a full
/// arbitrary-precision decimal crate for that would add a dependency
/// with no behavior this codec exercises; see `DESIGN.md`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BananaDecimal(String);

/// A `BananaDecimal` string failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal literal: {0:?}")]
pub struct DecimalParseError(pub String);

impl BananaDecimal {
    /// Validate and wrap a decimal literal.
    ///
    /// Accepts standard decimal syntax (`-123.456`, `+0.1e10`) and the
    /// three special forms Python's `decimal.Decimal` recognizes:
    /// `NaN`, `Infinity`, `-Infinity`.
    pub fn parse(text: &str) -> Result<Self, DecimalParseError> {
        if is_valid_decimal_literal(text) {
            Ok(Self(text.to_string()))
        } else {
            Err(DecimalParseError(text.to_string()))
        }
    }

    /// The canonical text form, exactly as it will be re-encoded.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BananaDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_decimal_literal(text: &str) -> bool {
    let mut s = text;
    if let Some(rest) = s.strip_prefix(['+', '-']) {
        s = rest;
    }
    if s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("infinity") || s.eq_ignore_ascii_case("inf") {
        return true;
    }
    if s.is_empty() {
        return false;
    }

    let mut chars = s.chars().peekable();
    let mut saw_digit = false;
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
        chars.next();
        saw_digit = true;
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
            saw_digit = true;
        }
    }
    if !saw_digit {
        return false;
    }
    if matches!(chars.peek(), Some('e' | 'E')) {
        chars.next();
        if matches!(chars.peek(), Some('+' | '-')) {
            chars.next();
        }
        let mut saw_exp_digit = false;
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
            saw_exp_digit = true;
        }
        if !saw_exp_digit {
            return false;
        }
    }
    chars.next().is_none()
}

/// A decoded (or about-to-be-encoded) value in the object graph.
///
/// `Unresolved` is an implementation detail: it is the placeholder a
/// container slot holds while it waits for a cyclic reference to
/// resolve. It is always patched away before decoding of the
/// surrounding frame completes for any well-formed input, and is never
/// produced by `RootUnslicer::receive_close`'s final output.
#[derive(Debug, Clone)]
pub enum Value {
    /// `None`.
    None,
    /// `True`/`False`.
    Bool(bool),
    /// An integer that fits in `i64`.
    Int(i64),
    /// An integer outside `i64` range.
    BigInt(BigInt),
    /// An IEEE-754 double.
    Float(f64),
    /// A raw byte string.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Str(String),
    /// A decimal value.
    Decimal(BananaDecimal),
    /// A `list` or `tuple`.
    Seq(SeqKind, Shared<Vec<Value>>),
    /// A `dict`: insertion-ordered key/value pairs.
    Dict(Shared<Vec<(Value, Value)>>),
    /// A mutable `set`.
    Set(Shared<Vec<Value>>),
    /// An `immutable-set` (`frozenset`).
    FrozenSet(Shared<Vec<Value>>),
    /// An unsafe-mode instance (opaque reduction-protocol data).
    Instance(Rc<Instance>),
    /// An unsafe-mode module reference, by fully-qualified name.
    Module(String),
    /// An unsafe-mode class reference, by fully-qualified name.
    Class(String),
    /// An unsafe-mode free function reference, by fully-qualified name.
    Function(String),
    /// An unsafe-mode bound method reference.
    Method {
        /// Fully-qualified class name the method belongs to.
        class: String,
        /// Method name.
        name: String,
    },
    /// Placeholder for a cyclic reference still awaiting resolution.
    /// See the type-level doc comment.
    Unresolved(u64),
}

impl Value {
    /// Shorthand for `Value::Seq(SeqKind::List, ...)` over a fresh vec.
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Self::Seq(SeqKind::List, Rc::new(RefCell::new(items)))
    }

    /// Shorthand for `Value::Seq(SeqKind::Tuple, ...)` over a fresh vec.
    #[must_use]
    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Seq(SeqKind::Tuple, Rc::new(RefCell::new(items)))
    }

    /// Whether this value is tracked for reference sharing — i.e.
    /// whether two `send()`s of the same identity should collapse into
    /// a `(reference N)` frame the second time. Scalars are never
    /// tracked: immutables like small ints have no stable identity
    /// worth preserving across a round trip.
    #[must_use]
    pub fn is_reference_tracked(&self) -> bool {
        matches!(
            self,
            Self::Seq(..) | Self::Dict(_) | Self::Set(_) | Self::FrozenSet(_) | Self::Instance(_)
        )
    }

    /// Identity key for reference tracking: the backing allocation's
    /// address. Only meaningful for [`Self::is_reference_tracked`]
    /// values.
    #[must_use]
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::Seq(_, rc) => Some(Rc::as_ptr(rc) as usize),
            Self::Dict(rc) | Self::Set(rc) | Self::FrozenSet(rc) => Some(Rc::as_ptr(rc) as usize),
            Self::Instance(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }

    /// Whether this value can be a dict/set key. Containers have no
    /// stable identity-independent equality in this codec, matching
    /// Python's "unhashable type" restriction on mutable containers.
    /// An [`Self::Unresolved`] placeholder is also rejected: it stands
    /// in for a value whose identity isn't known yet, so admitting it as
    /// a key would let two distinct forward references collide or a
    /// single one silently diverge once patched.
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        !matches!(
            self,
            Self::Seq(..) | Self::Dict(_) | Self::Set(_) | Self::Instance(_) | Self::Unresolved(_)
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Int(a), Self::BigInt(b)) | (Self::BigInt(b), Self::Int(a)) => {
                BigInt::from(*a) == *b
            },
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Seq(ka, a), Self::Seq(kb, b)) => ka == kb && *a.borrow() == *b.borrow(),
            (Self::Dict(a), Self::Dict(b)) => *a.borrow() == *b.borrow(),
            (Self::Set(a), Self::Set(b)) | (Self::FrozenSet(a), Self::FrozenSet(b)) => {
                set_eq(&a.borrow(), &b.borrow())
            },
            (Self::Module(a), Self::Module(b))
            | (Self::Class(a), Self::Class(b))
            | (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Method { class: ca, name: na }, Self::Method { class: cb, name: nb }) => {
                ca == cb && na == nb
            },
            (Self::Unresolved(a), Self::Unresolved(b)) => a == b,
            _ => false,
        }
    }
}

fn set_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_accepts_plain_and_special_forms() {
        assert!(BananaDecimal::parse("123.456").is_ok());
        assert!(BananaDecimal::parse("-0.000003").is_ok());
        assert!(BananaDecimal::parse("+1e10").is_ok());
        assert!(BananaDecimal::parse("NaN").is_ok());
        assert!(BananaDecimal::parse("-Infinity").is_ok());
        assert!(BananaDecimal::parse("").is_err());
        assert!(BananaDecimal::parse("abc").is_err());
        assert!(BananaDecimal::parse("1.2.3").is_err());
    }

    #[test]
    fn int_and_bigint_compare_equal_when_same_value() {
        assert_eq!(Value::Int(5), Value::BigInt(BigInt::from(5)));
    }

    #[test]
    fn shared_list_identity_is_stable() {
        let v = Value::list(vec![Value::Int(1)]);
        let id1 = v.identity();
        let id2 = v.identity();
        assert_eq!(id1, id2);
        assert!(id1.is_some());
    }
}
