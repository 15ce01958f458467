//! Schema constraints.
//!
//! A constraint is attached to an unslicer slot and vets incoming data
//! before it is accepted into the object graph: the opentype (is this
//! the kind of thing we expected here?) and then each scalar token as
//! it arrives. Rejections are [`Violation`]s — the enclosing frame is
//! aborted but the connection survives.

use std::rc::Rc;

use crate::error::Violation;
use crate::value::Value;

/// Vets values as they arrive at a given slot in the object graph.
///
/// Implementations mirror the granularity of Foolscap's
/// `schema.Constraint` subclasses: each hook is optional to implement
/// (default accepts everything) so a constraint can narrow only the
/// part of the value shape it cares about.
pub trait Constraint: std::fmt::Debug {
    /// Called once an `OPEN`'s opentype name is known, before any body
    /// tokens arrive. `path` is the dotted path for diagnostics.
    fn check_opentype(&self, path: &str, opentype: &[u8]) -> Result<(), Violation> {
        let _ = (path, opentype);
        Ok(())
    }

    /// Called for each fully-assembled scalar value placed directly
    /// under this slot (not recursively — container constraints check
    /// their own elements via their own nested constraints).
    fn check_value(&self, path: &str, value: &Value) -> Result<(), Violation> {
        let _ = (path, value);
        Ok(())
    }

    /// Maximum number of elements a container at this slot may hold,
    /// if bounded.
    fn max_length(&self) -> Option<usize> {
        None
    }

    /// The constraint to apply to each element of a container at this
    /// slot, if any is narrower than [`Any`].
    ///
    /// Returns an owned `Rc` rather than a borrow so the driver can
    /// carry it down into a freshly-pushed decode frame without tying
    /// that frame's lifetime to the parent constraint's.
    fn element_constraint(&self) -> Option<Rc<dyn Constraint>> {
        None
    }
}

/// Accepts anything. The default constraint for unconstrained slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Any;

impl Constraint for Any {}

/// Restricts a slot to integers within `[min, max]` (either bound
/// optional). Applies to both `Value::Int` and `Value::BigInt`.
#[derive(Debug, Clone)]
pub struct IntRange {
    /// Inclusive lower bound, if any.
    pub min: Option<i64>,
    /// Inclusive upper bound, if any.
    pub max: Option<i64>,
}

impl Constraint for IntRange {
    fn check_value(&self, path: &str, value: &Value) -> Result<(), Violation> {
        let as_i64 = match value {
            Value::Int(n) => Some(*n),
            Value::BigInt(_) => None,
            _ => {
                return Err(Violation::SchemaMismatch {
                    path: path.to_string(),
                    reason: "expected an integer".to_string(),
                })
            },
        };
        let Some(n) = as_i64 else {
            // Out-of-i64-range bigints always fail a bounded IntRange:
            // any finite min/max fits in i64 by construction here.
            return Err(Violation::ConstraintBreach {
                path: path.to_string(),
                detail: "integer magnitude exceeds constraint range".to_string(),
            });
        };
        if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
            return Err(Violation::ConstraintBreach {
                path: path.to_string(),
                detail: format!("{n} outside allowed range {:?}..={:?}", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Restricts a slot to byte strings no longer than `max_length`.
#[derive(Debug, Clone, Copy)]
pub struct ByteStringConstraint {
    /// Maximum permitted length in bytes.
    pub max_length: usize,
}

impl Constraint for ByteStringConstraint {
    fn check_value(&self, path: &str, value: &Value) -> Result<(), Violation> {
        match value {
            Value::Bytes(b) if b.len() <= self.max_length => Ok(()),
            Value::Bytes(b) => Err(Violation::ConstraintBreach {
                path: path.to_string(),
                detail: format!("byte string length {} exceeds limit {}", b.len(), self.max_length),
            }),
            _ => Err(Violation::SchemaMismatch {
                path: path.to_string(),
                reason: "expected a byte string".to_string(),
            }),
        }
    }
}

/// Restricts a slot to UTF-8 strings no longer than `max_length`
/// (measured in bytes, matching the wire-level length prefix).
#[derive(Debug, Clone, Copy)]
pub struct StringConstraint {
    /// Maximum permitted length in bytes.
    pub max_length: usize,
}

impl Constraint for StringConstraint {
    fn check_value(&self, path: &str, value: &Value) -> Result<(), Violation> {
        match value {
            Value::Str(s) if s.len() <= self.max_length => Ok(()),
            Value::Str(s) => Err(Violation::ConstraintBreach {
                path: path.to_string(),
                detail: format!("string length {} exceeds limit {}", s.len(), self.max_length),
            }),
            _ => Err(Violation::SchemaMismatch {
                path: path.to_string(),
                reason: "expected a string".to_string(),
            }),
        }
    }
}

/// Restricts a slot to a `list`, bounding its length and constraining
/// each element.
#[derive(Debug)]
pub struct ListOf {
    /// Constraint applied to every element.
    pub element: Rc<dyn Constraint>,
    /// Maximum permitted element count, if bounded.
    pub max_length: Option<usize>,
}

impl Constraint for ListOf {
    fn check_opentype(&self, path: &str, opentype: &[u8]) -> Result<(), Violation> {
        if opentype == crate::opentype::LIST {
            Ok(())
        } else {
            Err(Violation::SchemaMismatch {
                path: path.to_string(),
                reason: "expected a list".to_string(),
            })
        }
    }

    fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    fn element_constraint(&self) -> Option<Rc<dyn Constraint>> {
        Some(self.element.clone())
    }
}

/// Restricts a slot to a `dict`, constraining its key and value types.
#[derive(Debug)]
pub struct DictOf {
    /// Constraint applied to every key.
    pub key: Rc<dyn Constraint>,
    /// Constraint applied to every value.
    pub value: Rc<dyn Constraint>,
    /// Maximum permitted entry count, if bounded.
    pub max_length: Option<usize>,
}

impl Constraint for DictOf {
    fn check_opentype(&self, path: &str, opentype: &[u8]) -> Result<(), Violation> {
        if opentype == crate::opentype::DICT {
            Ok(())
        } else {
            Err(Violation::SchemaMismatch {
                path: path.to_string(),
                reason: "expected a dict".to_string(),
            })
        }
    }

    fn max_length(&self) -> Option<usize> {
        self.max_length
    }
}

impl DictOf {
    /// Check a single key/value pair against this constraint's key and
    /// value sub-constraints.
    pub fn check_entry(&self, path: &str, key: &Value, value: &Value) -> Result<(), Violation> {
        self.key.check_value(path, key)?;
        self.value.check_value(path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_range_rejects_out_of_bounds() {
        let c = IntRange { min: Some(0), max: Some(10) };
        assert!(c.check_value("root", &Value::Int(5)).is_ok());
        assert!(c.check_value("root", &Value::Int(11)).is_err());
        assert!(c.check_value("root", &Value::Int(-1)).is_err());
    }

    #[test]
    fn list_of_enforces_opentype_and_length() {
        let c = ListOf { element: Rc::new(Any), max_length: Some(2) };
        assert!(c.check_opentype("root", crate::opentype::LIST).is_ok());
        assert!(c.check_opentype("root", crate::opentype::TUPLE).is_err());
        assert_eq!(c.max_length(), Some(2));
    }

    #[test]
    fn byte_string_constraint_enforces_length() {
        let c = ByteStringConstraint { max_length: 3 };
        assert!(c.check_value("root", &Value::Bytes(vec![1, 2, 3])).is_ok());
        assert!(c.check_value("root", &Value::Bytes(vec![1, 2, 3, 4])).is_err());
    }
}
