//! Slicers for `list`/`tuple`, `dict`, and `set`/`immutable-set`.

use crate::error::StepResult;
use crate::opentype;
use crate::slicer::{Atom, SliceStep, Slicer};
use crate::value::{SeqKind, Shared, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    Body,
    Close,
    Done,
}

/// Slicer for `Value::Seq` (both `list` and `tuple`).
#[derive(Debug)]
pub struct SeqSlicer {
    path: String,
    kind: SeqKind,
    items: Shared<Vec<Value>>,
    index: usize,
    stage: Stage,
}

impl SeqSlicer {
    /// Build a slicer over `items`, tagged by `kind`.
    #[must_use]
    pub fn new(path: String, kind: SeqKind, items: Shared<Vec<Value>>) -> Self {
        Self { path, kind, items, index: 0, stage: Stage::Open }
    }
}

impl Slicer for SeqSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        match self.stage {
            Stage::Open => {
                let kind = match self.kind {
                    SeqKind::List => opentype::LIST,
                    SeqKind::Tuple => opentype::TUPLE,
                };
                self.stage = Stage::Body;
                Ok(SliceStep::Emit(Atom::Open(opentype::single(kind))))
            },
            Stage::Body => {
                let len = self.items.borrow().len();
                if self.index >= len {
                    self.stage = Stage::Close;
                    return self.next_step();
                }
                let value = self.items.borrow()[self.index].clone();
                self.index += 1;
                Ok(SliceStep::Recurse(value))
            },
            Stage::Close => {
                self.stage = Stage::Done;
                Ok(SliceStep::Emit(Atom::Close))
            },
            Stage::Done => Ok(SliceStep::Done),
        }
    }
}

/// Slicer for `Value::Dict`, streaming alternating key/value children.
#[derive(Debug)]
pub struct DictSlicer {
    path: String,
    entries: Shared<Vec<(Value, Value)>>,
    index: usize,
    pending_value: Option<Value>,
    stage: Stage,
}

impl DictSlicer {
    /// Build a slicer over `entries`.
    #[must_use]
    pub fn new(path: String, entries: Shared<Vec<(Value, Value)>>) -> Self {
        Self { path, entries, index: 0, pending_value: None, stage: Stage::Open }
    }
}

impl Slicer for DictSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        match self.stage {
            Stage::Open => {
                self.stage = Stage::Body;
                Ok(SliceStep::Emit(Atom::Open(opentype::single(opentype::DICT))))
            },
            Stage::Body => {
                if let Some(value) = self.pending_value.take() {
                    return Ok(SliceStep::Recurse(value));
                }
                let len = self.entries.borrow().len();
                if self.index >= len {
                    self.stage = Stage::Close;
                    return self.next_step();
                }
                let (key, value) = self.entries.borrow()[self.index].clone();
                self.index += 1;
                self.pending_value = Some(value);
                Ok(SliceStep::Recurse(key))
            },
            Stage::Close => {
                self.stage = Stage::Done;
                Ok(SliceStep::Emit(Atom::Close))
            },
            Stage::Done => Ok(SliceStep::Done),
        }
    }
}

/// Slicer for `Value::Set`/`Value::FrozenSet`.
#[derive(Debug)]
pub struct SetSlicer {
    path: String,
    items: Shared<Vec<Value>>,
    frozen: bool,
    index: usize,
    stage: Stage,
}

impl SetSlicer {
    /// Build a slicer over `items`. `frozen` selects `immutable-set`
    /// over `set` as the opentype.
    #[must_use]
    pub fn new(path: String, items: Shared<Vec<Value>>, frozen: bool) -> Self {
        Self { path, items, frozen, index: 0, stage: Stage::Open }
    }
}

impl Slicer for SetSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        match self.stage {
            Stage::Open => {
                let kind = if self.frozen { opentype::IMMUTABLE_SET } else { opentype::SET };
                self.stage = Stage::Body;
                Ok(SliceStep::Emit(Atom::Open(opentype::single(kind))))
            },
            Stage::Body => {
                let len = self.items.borrow().len();
                if self.index >= len {
                    self.stage = Stage::Close;
                    return self.next_step();
                }
                let value = self.items.borrow()[self.index].clone();
                self.index += 1;
                Ok(SliceStep::Recurse(value))
            },
            Stage::Close => {
                self.stage = Stage::Done;
                Ok(SliceStep::Emit(Atom::Close))
            },
            Stage::Done => Ok(SliceStep::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn seq_slicer_emits_open_children_close() {
        let items = Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2)]));
        let mut slicer = SeqSlicer::new("root".into(), SeqKind::List, items);
        assert_eq!(
            slicer.next_step().unwrap(),
            SliceStep::Emit(Atom::Open(opentype::single(opentype::LIST)))
        );
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Recurse(Value::Int(1)));
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Recurse(Value::Int(2)));
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Emit(Atom::Close));
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Done);
    }

    #[test]
    fn dict_slicer_interleaves_key_then_value() {
        let entries = Rc::new(RefCell::new(vec![(Value::Str("a".into()), Value::Int(1))]));
        let mut slicer = DictSlicer::new("root".into(), entries);
        assert_eq!(
            slicer.next_step().unwrap(),
            SliceStep::Emit(Atom::Open(opentype::single(opentype::DICT)))
        );
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Recurse(Value::Str("a".into())));
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Recurse(Value::Int(1)));
        assert_eq!(slicer.next_step().unwrap(), SliceStep::Emit(Atom::Close));
    }
}
