//! Unslicer for the `reference` opentype.
//!
//! A `reference` frame carries a single int: the frame id of an object
//! that is either already fully assembled (resolves immediately) or
//! still being built further up the stack (resolves to a
//! [`Value::Unresolved`] placeholder that the enclosing frame must hold
//! until the target closes).

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BananaError, StepResult, Violation};
use crate::value::Value;

use super::Unslicer;
use super::root::{ReferenceSlot, ReferenceTable};

/// Unslicer for a `reference` frame at `path`, resolving against the
/// shared `table` of frame ids known so far.
#[derive(Debug)]
pub struct ReferenceUnslicer {
    path: String,
    table: Rc<RefCell<ReferenceTable>>,
    target: Option<u64>,
}

impl ReferenceUnslicer {
    /// Build an unslicer for a `reference` frame at `path`, resolving
    /// against `table`.
    #[must_use]
    pub fn new(path: String, table: Rc<RefCell<ReferenceTable>>) -> Self {
        Self { path, table, target: None }
    }
}

impl Unslicer for ReferenceUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        if self.target.is_some() {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "reference takes exactly one int body".to_string(),
            }
            .into());
        }
        match child {
            Value::Int(n) if n >= 0 => {
                self.target = Some(n as u64);
                Ok(())
            },
            _ => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "reference body must be a non-negative int".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        let Some(target) = self.target else {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "reference closed without a target id".to_string(),
            }
            .into());
        };
        match self.table.borrow().get(target) {
            Some(ReferenceSlot::Resolved(value)) => Ok(value.clone()),
            Some(ReferenceSlot::Pending(_)) => Ok(Value::Unresolved(target)),
            None => Err(BananaError::UnknownReference { refid: target }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_immediately_when_target_already_closed() {
        let table = Rc::new(RefCell::new(ReferenceTable::new()));
        table.borrow_mut().open(0);
        table.borrow_mut().close(0, Value::Int(42));

        let mut u = ReferenceUnslicer::new("root".into(), table);
        u.receive_child(Value::Int(0)).unwrap();
        assert_eq!(u.receive_close().unwrap(), Value::Int(42));
    }

    #[test]
    fn resolves_to_placeholder_when_target_still_open() {
        let table = Rc::new(RefCell::new(ReferenceTable::new()));
        table.borrow_mut().open(3);

        let mut u = ReferenceUnslicer::new("root".into(), table);
        u.receive_child(Value::Int(3)).unwrap();
        assert_eq!(u.receive_close().unwrap(), Value::Unresolved(3));
    }

    #[test]
    fn unknown_target_is_fatal() {
        let table = Rc::new(RefCell::new(ReferenceTable::new()));
        let mut u = ReferenceUnslicer::new("root".into(), table);
        u.receive_child(Value::Int(99)).unwrap();
        assert!(u.receive_close().is_err());
    }
}
