//! Unslicers for `list`/`tuple`, `dict`, `set`/`immutable-set`.
//!
//! Each holds its backing storage as a [`Shared`] handle from the
//! moment it is constructed (at `OPEN`), not only once its `CLOSE`
//! arrives. That is what lets a cyclic reference to a frame that is
//! still being filled in resolve immediately, by cloning the same
//! `Rc` — see `crate::unslicer::root`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BananaError, StepResult, Violation};
use crate::value::{SeqKind, Shared, Value};

use super::{PatchSite, Unslicer};

/// Unslicer for a `list` or `tuple` frame.
#[derive(Debug)]
pub struct SeqUnslicer {
    path: String,
    kind: SeqKind,
    backing: Shared<Vec<Value>>,
    max_length: Option<usize>,
}

impl SeqUnslicer {
    /// Build an unslicer for a `list`/`tuple` frame at `path`, with an
    /// optional constraint-provided maximum length.
    #[must_use]
    pub fn new(path: String, kind: SeqKind, max_length: Option<usize>) -> Self {
        Self { path, kind, backing: Rc::new(RefCell::new(Vec::new())), max_length }
    }

    /// The live backing handle, stable across the frame's whole
    /// lifetime — usable as a forward-reference target before `CLOSE`.
    #[must_use]
    pub fn handle(&self) -> Value {
        Value::Seq(self.kind, self.backing.clone())
    }
}

impl Unslicer for SeqUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        if let Some(max) = self.max_length {
            if self.backing.borrow().len() >= max {
                return Err(Violation::ConstraintBreach {
                    path: self.path.clone(),
                    detail: format!("sequence exceeds maximum length {max}"),
                }
                .into());
            }
        }
        self.backing.borrow_mut().push(child);
        Ok(())
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        Ok(self.handle())
    }

    fn last_child_site(&self) -> Option<PatchSite> {
        let len = self.backing.borrow().len();
        len.checked_sub(1).map(|index| PatchSite::Seq { backing: self.backing.clone(), index })
    }
}

/// Unslicer for a `dict` frame, collecting alternating key/value
/// children.
#[derive(Debug)]
pub struct DictUnslicer {
    path: String,
    backing: Shared<Vec<(Value, Value)>>,
    pending_key: Option<Value>,
    max_length: Option<usize>,
}

impl DictUnslicer {
    /// Build an unslicer for a `dict` frame at `path`.
    #[must_use]
    pub fn new(path: String, max_length: Option<usize>) -> Self {
        Self { path, backing: Rc::new(RefCell::new(Vec::new())), pending_key: None, max_length }
    }

    /// The live backing handle, stable before `CLOSE`.
    #[must_use]
    pub fn handle(&self) -> Value {
        Value::Dict(self.backing.clone())
    }
}

impl Unslicer for DictUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match self.pending_key.take() {
            None => {
                if !child.is_hashable() {
                    return Err(BananaError::UnhashableDictKey { path: self.path.clone() }.into());
                }
                if self.backing.borrow().iter().any(|(k, _)| k == &child) {
                    return Err(BananaError::DuplicateDictKey { path: self.path.clone() }.into());
                }
                self.pending_key = Some(child);
                Ok(())
            },
            Some(key) => {
                if let Some(max) = self.max_length {
                    if self.backing.borrow().len() >= max {
                        return Err(Violation::ConstraintBreach {
                            path: self.path.clone(),
                            detail: format!("dict exceeds maximum length {max}"),
                        }
                        .into());
                    }
                }
                self.backing.borrow_mut().push((key, child));
                Ok(())
            },
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        if self.pending_key.is_some() {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "dict closed with a dangling key and no value".to_string(),
            }
            .into());
        }
        Ok(self.handle())
    }

    fn last_child_site(&self) -> Option<PatchSite> {
        if self.pending_key.is_some() {
            return None;
        }
        let len = self.backing.borrow().len();
        len.checked_sub(1).map(|index| PatchSite::DictValue { backing: self.backing.clone(), index })
    }
}

/// Unslicer for a `set` or `immutable-set` frame.
#[derive(Debug)]
pub struct SetUnslicer {
    path: String,
    backing: Shared<Vec<Value>>,
    frozen: bool,
}

impl SetUnslicer {
    /// Build an unslicer for a `set`/`immutable-set` frame at `path`.
    #[must_use]
    pub fn new(path: String, frozen: bool) -> Self {
        Self { path, backing: Rc::new(RefCell::new(Vec::new())), frozen }
    }

    /// The live backing handle, stable before `CLOSE`.
    #[must_use]
    pub fn handle(&self) -> Value {
        if self.frozen {
            Value::FrozenSet(self.backing.clone())
        } else {
            Value::Set(self.backing.clone())
        }
    }
}

impl Unslicer for SetUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        if !child.is_hashable() {
            return Err(BananaError::UnhashableDictKey { path: self.path.clone() }.into());
        }
        if !self.backing.borrow().contains(&child) {
            self.backing.borrow_mut().push(child);
        }
        Ok(())
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        Ok(self.handle())
    }

    fn last_child_site(&self) -> Option<PatchSite> {
        let len = self.backing.borrow().len();
        len.checked_sub(1).map(|index| PatchSite::Seq { backing: self.backing.clone(), index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_unslicer_rejects_duplicate_keys() {
        let mut u = DictUnslicer::new("root".into(), None);
        u.receive_child(Value::Str("a".into())).unwrap();
        u.receive_child(Value::Int(1)).unwrap();
        u.receive_child(Value::Str("a".into())).unwrap_err();
    }

    #[test]
    fn dict_unslicer_rejects_unhashable_keys() {
        let mut u = DictUnslicer::new("root".into(), None);
        let err = u.receive_child(Value::list(vec![])).unwrap_err();
        assert!(matches!(err, crate::error::StepError::Fatal(BananaError::UnhashableDictKey { .. })));
    }

    #[test]
    fn seq_unslicer_enforces_max_length() {
        let mut u = SeqUnslicer::new("root".into(), SeqKind::List, Some(1));
        u.receive_child(Value::Int(1)).unwrap();
        assert!(u.receive_child(Value::Int(2)).is_err());
    }

    #[test]
    fn set_unslicer_deduplicates() {
        let mut u = SetUnslicer::new("root".into(), false);
        u.receive_child(Value::Int(1)).unwrap();
        u.receive_child(Value::Int(1)).unwrap();
        let Value::Set(items) = u.receive_close().unwrap() else { panic!() };
        assert_eq!(items.borrow().len(), 1);
    }

    #[test]
    fn handle_is_stable_before_and_after_close() {
        let mut u = SeqUnslicer::new("root".into(), SeqKind::List, None);
        let before = u.handle();
        u.receive_child(Value::Int(1)).unwrap();
        let after = u.receive_close().unwrap();
        assert_eq!(before.identity(), after.identity());
    }
}
