//! Slicers for values with no children: everything that emits a short,
//! fixed sequence of atoms and is then `Done`.

use std::collections::VecDeque;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::StepResult;
use crate::opentype;
use crate::slicer::{Atom, SliceStep, Slicer};
use crate::value::Value;

/// A slicer for a single self-contained scalar token, or a short
/// `OPEN atom CLOSE` wrapper for the scalars that need one (`none`,
/// `boolean`, `unicode`, `decimal` — the one-token opentypes with a
/// body).
#[derive(Debug)]
pub struct ScalarSlicer {
    path: String,
    steps: VecDeque<Atom>,
}

impl ScalarSlicer {
    /// Build a scalar slicer for `value`, or `None` if `value` is not
    /// a scalar this slicer handles (containers and instances have
    /// their own slicers).
    #[must_use]
    pub fn try_new(path: String, value: Value) -> Option<Self> {
        let steps: Vec<Atom> = match value {
            Value::None => wrapped(opentype::NONE, None),
            Value::Bool(b) => wrapped(opentype::BOOLEAN, Some(Atom::Int(i64::from(b)))),
            Value::Int(n) => vec![Atom::Int(n)],
            Value::BigInt(n) => vec![big_int_atom(n)],
            Value::Float(f) => vec![Atom::Float(f)],
            Value::Bytes(b) => vec![Atom::Bytes(b)],
            Value::Str(s) => wrapped(opentype::UNICODE, Some(Atom::Str(s))),
            Value::Decimal(d) => wrapped(opentype::DECIMAL, Some(Atom::Str(d.as_str().to_string()))),
            _ => return None,
        };
        Some(Self { path, steps: steps.into() })
    }
}

fn wrapped(kind: &'static [u8], body: Option<Atom>) -> Vec<Atom> {
    let mut steps = vec![Atom::Open(opentype::single(kind))];
    steps.extend(body);
    steps.push(Atom::Close);
    steps
}

fn big_int_atom(n: BigInt) -> Atom {
    if let Some(small) = n.to_i64() {
        Atom::Int(small)
    } else {
        Atom::BigInt(n)
    }
}

impl Slicer for ScalarSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        match self.steps.pop_front() {
            Some(atom) => Ok(SliceStep::Emit(atom)),
            None => Ok(SliceStep::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut s: ScalarSlicer) -> Vec<Atom> {
        let mut out = Vec::new();
        loop {
            match s.next_step().unwrap() {
                SliceStep::Emit(a) => out.push(a),
                SliceStep::Done => break,
                other => panic!("unexpected step {other:?}"),
            }
        }
        out
    }

    #[test]
    fn bare_int_is_a_single_atom() {
        let s = ScalarSlicer::try_new("root".into(), Value::Int(42)).unwrap();
        assert_eq!(drain(s), vec![Atom::Int(42)]);
    }

    #[test]
    fn bool_is_wrapped_in_opentype() {
        let s = ScalarSlicer::try_new("root".into(), Value::Bool(true)).unwrap();
        assert_eq!(
            drain(s),
            vec![Atom::Open(opentype::single(opentype::BOOLEAN)), Atom::Int(1), Atom::Close]
        );
    }

    #[test]
    fn none_has_no_body_atom() {
        let s = ScalarSlicer::try_new("root".into(), Value::None).unwrap();
        assert_eq!(drain(s), vec![Atom::Open(opentype::single(opentype::NONE)), Atom::Close]);
    }

    #[test]
    fn big_int_beyond_i64_stays_bigint() {
        let huge = BigInt::from(1i64) << 100;
        let s = ScalarSlicer::try_new("root".into(), Value::BigInt(huge.clone())).unwrap();
        assert_eq!(drain(s), vec![Atom::BigInt(huge)]);
    }

    #[test]
    fn big_int_within_i64_downgrades_to_int() {
        let small = BigInt::from(7);
        let s = ScalarSlicer::try_new("root".into(), Value::BigInt(small)).unwrap();
        assert_eq!(drain(s), vec![Atom::Int(7)]);
    }
}
