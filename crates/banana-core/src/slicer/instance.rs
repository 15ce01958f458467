//! Unsafe-mode instance slicer.
//!
//! Protocol 2 is always emitted: a protocol-number int, the class name
//! as a nested `class` frame, the `args` tuple, a state-pair count,
//! that many flat state pairs, then a `list` of `listitems` and a
//! `dict` of `dictitems`. The explicit count is what lets the unslicer
//! tell "one more state pair" apart from "the listitems/dictitems
//! trailer" with no ambiguity; see DESIGN.md.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::StepResult;
use crate::opentype;
use crate::value::{Instance, SeqKind, Value};

use super::{Atom, SliceStep, Slicer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    Protocol,
    ClassName,
    Args,
    StateCount,
    State,
    ListItems,
    DictItems,
    Close,
    Done,
}

/// Slicer for `Value::Instance`, emitting protocol-2 reduction frames.
#[derive(Debug)]
pub struct InstanceSlicer {
    path: String,
    instance: Rc<Instance>,
    stage: Stage,
    args_sent: bool,
    state_index: usize,
    pending_state_value: Option<Value>,
}

impl InstanceSlicer {
    /// Build a slicer for `instance`.
    #[must_use]
    pub fn new(path: String, instance: Rc<Instance>) -> Self {
        Self { path, instance, stage: Stage::Open, args_sent: false, state_index: 0, pending_state_value: None }
    }
}

impl Slicer for InstanceSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        match self.stage {
            Stage::Open => {
                self.stage = Stage::Protocol;
                Ok(SliceStep::Emit(Atom::Open(opentype::single(opentype::INSTANCE))))
            },
            Stage::Protocol => {
                self.stage = Stage::ClassName;
                // Always protocol 2 on encode regardless of the source
                // `Instance`'s own `protocol` field; see the module doc
                // comment and DESIGN.md.
                Ok(SliceStep::Emit(Atom::Int(2)))
            },
            Stage::ClassName => {
                self.stage = Stage::Args;
                // The class name is a nested `class` frame (`(class
                // "Bar")`), not a bare string token; the driver
                // dispatches `Value::Class` to `NameSlicer` with
                // `opentype::CLASS`, so recursing here reuses it.
                Ok(SliceStep::Recurse(Value::Class(self.instance.class_name.clone())))
            },
            Stage::Args => {
                if !self.args_sent {
                    self.args_sent = true;
                    let args = self.instance.args.borrow().clone();
                    return Ok(SliceStep::Recurse(Value::tuple(args)));
                }
                self.stage = Stage::StateCount;
                self.next_step()
            },
            Stage::StateCount => {
                let count = self.instance.state.borrow().len();
                self.stage = Stage::State;
                Ok(SliceStep::Emit(Atom::Int(i64::try_from(count).unwrap_or(i64::MAX))))
            },
            Stage::State => {
                if let Some(value) = self.pending_state_value.take() {
                    return Ok(SliceStep::Recurse(value));
                }
                let len = self.instance.state.borrow().len();
                if self.state_index >= len {
                    self.stage = Stage::ListItems;
                    return self.next_step();
                }
                let (key, value) = self.instance.state.borrow()[self.state_index].clone();
                self.state_index += 1;
                self.pending_state_value = Some(value);
                Ok(SliceStep::Recurse(key))
            },
            Stage::ListItems => {
                self.stage = Stage::DictItems;
                let items = self.instance.list_items.borrow().clone();
                Ok(SliceStep::Recurse(Value::Seq(SeqKind::List, Rc::new(std::cell::RefCell::new(items)))))
            },
            Stage::DictItems => {
                self.stage = Stage::Close;
                let entries = self.instance.dict_items.borrow().clone();
                Ok(SliceStep::Recurse(Value::Dict(Rc::new(std::cell::RefCell::new(entries)))))
            },
            Stage::Close => {
                self.stage = Stage::Done;
                Ok(SliceStep::Emit(Atom::Close))
            },
            Stage::Done => Ok(SliceStep::Done),
        }
    }
}

/// Slicer for the `module`/`class`/`function` opentypes: a single
/// string body naming the referenced object by its dotted path.
#[derive(Debug)]
pub struct NameSlicer {
    path: String,
    steps: VecDeque<Atom>,
}

impl NameSlicer {
    /// Build a slicer for a `kind` (`module`/`class`/`function`) frame
    /// naming `name`.
    #[must_use]
    pub fn new(path: String, kind: &'static [u8], name: String) -> Self {
        let steps = VecDeque::from([Atom::Open(opentype::single(kind)), Atom::Str(name), Atom::Close]);
        Self { path, steps }
    }
}

impl Slicer for NameSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        Ok(match self.steps.pop_front() {
            Some(atom) => SliceStep::Emit(atom),
            None => SliceStep::Done,
        })
    }
}

/// Slicer for the `method` opentype: the owning class name followed by
/// the method name.
#[derive(Debug)]
pub struct MethodSlicer {
    path: String,
    steps: VecDeque<Atom>,
}

impl MethodSlicer {
    /// Build a slicer for a bound method named `name` on `class`.
    #[must_use]
    pub fn new(path: String, class: String, name: String) -> Self {
        let steps =
            VecDeque::from([Atom::Open(opentype::single(opentype::METHOD)), Atom::Str(class), Atom::Str(name), Atom::Close]);
        Self { path, steps }
    }
}

impl Slicer for MethodSlicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn next_step(&mut self) -> StepResult<SliceStep> {
        Ok(match self.steps.pop_front() {
            Some(atom) => SliceStep::Emit(atom),
            None => SliceStep::Done,
        })
    }
}

#[cfg(test)]
mod name_method_tests {
    use super::*;

    #[test]
    fn name_slicer_emits_open_name_close() {
        let mut s = NameSlicer::new("root".into(), opentype::CLASS, "demo.Widget".to_string());
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Open(opentype::single(opentype::CLASS))));
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Str("demo.Widget".to_string())));
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Close));
        assert_eq!(s.next_step().unwrap(), SliceStep::Done);
    }

    #[test]
    fn method_slicer_emits_class_then_name() {
        let mut s = MethodSlicer::new("root".into(), "demo.Widget".to_string(), "spin".to_string());
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Open(opentype::single(opentype::METHOD))));
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Str("demo.Widget".to_string())));
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Str("spin".to_string())));
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Close));
        assert_eq!(s.next_step().unwrap(), SliceStep::Done);
    }
}
