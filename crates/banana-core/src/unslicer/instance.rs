//! Unsafe-mode instance unslicer.
//!
//! Accepts reduction protocols 0, 2, and 4 on decode, though only
//! protocol 2 is ever emitted by
//! [`super::super::slicer::instance::InstanceSlicer`]. The class name
//! arrives as a nested `class` frame (decoded by [`NameUnslicer`], not
//! read directly), matching `OPEN "instance" 2 (class "Bar") …`.
//! `listitems`/`dictitems` are read back via the explicit state-count +
//! trailing list/dict shape that slicer writes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BananaError, StepResult, Violation};
use crate::registry::ClassRegistry;
use crate::value::{Instance, ReduceProtocol, Value};

use super::Unslicer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Protocol,
    ClassName,
    Args,
    StateCount,
    State,
    ListItems,
    DictItems,
    Done,
}

/// Unslicer for an `instance` frame.
#[derive(Debug)]
pub struct InstanceUnslicer {
    path: String,
    registry: Rc<ClassRegistry>,
    stage: Stage,
    protocol: Option<ReduceProtocol>,
    class_name: Option<String>,
    args: Vec<Value>,
    state_count: Option<usize>,
    state: Vec<(Value, Value)>,
    pending_state_key: Option<Value>,
    list_items: Vec<Value>,
    dict_items: Vec<(Value, Value)>,
}

impl InstanceUnslicer {
    /// Build an unslicer for an `instance` frame at `path`, consulting
    /// `registry` to decide whether an arriving class name is
    /// acceptable.
    #[must_use]
    pub fn new(path: String, registry: Rc<ClassRegistry>) -> Self {
        Self {
            path,
            registry,
            stage: Stage::Protocol,
            protocol: None,
            class_name: None,
            args: Vec::new(),
            state_count: None,
            state: Vec::new(),
            pending_state_key: None,
            list_items: Vec::new(),
            dict_items: Vec::new(),
        }
    }
}

impl Unslicer for InstanceUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match self.stage {
            Stage::Protocol => {
                let Value::Int(n) = child else {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: "instance reduction protocol must be an int".to_string(),
                    }
                    .into());
                };
                self.protocol = Some(match n {
                    0 => ReduceProtocol::Zero,
                    2 => ReduceProtocol::Two,
                    4 => ReduceProtocol::Four,
                    other => {
                        return Err(BananaError::UnknownPickleProtocol { protocol: other as u64 }.into());
                    },
                });
                self.stage = Stage::ClassName;
                Ok(())
            },
            Stage::ClassName => {
                let Value::Class(name) = child else {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: "instance class name must be a `class` frame".to_string(),
                    }
                    .into());
                };
                if !self.registry.is_registered(&name) {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: format!("class {name:?} is not registered for unsafe unslicing"),
                    }
                    .into());
                }
                self.class_name = Some(name);
                self.stage = Stage::Args;
                Ok(())
            },
            Stage::Args => {
                let Value::Seq(_, items) = child else {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: "instance args must be a tuple".to_string(),
                    }
                    .into());
                };
                self.args = items.borrow().clone();
                self.stage = Stage::StateCount;
                Ok(())
            },
            Stage::StateCount => {
                let Value::Int(n) = child else {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: "instance state count must be an int".to_string(),
                    }
                    .into());
                };
                if n < 0 {
                    return Err(
                        Violation::SchemaMismatch { path: self.path.clone(), reason: "negative state count".to_string() }.into()
                    );
                }
                self.state_count = Some(n as usize);
                self.stage = Stage::State;
                Ok(())
            },
            Stage::State => {
                let target = self.state_count.unwrap_or(0);
                match self.pending_state_key.take() {
                    None => {
                        if self.state.len() >= target {
                            self.stage = Stage::ListItems;
                            return self.receive_child(child);
                        }
                        if !child.is_hashable() {
                            return Err(BananaError::UnhashableDictKey { path: self.path.clone() }.into());
                        }
                        self.pending_state_key = Some(child);
                        Ok(())
                    },
                    Some(key) => {
                        self.state.push((key, child));
                        Ok(())
                    },
                }
            },
            Stage::ListItems => {
                let Value::Seq(_, items) = child else {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: "listitems trailer must be a list".to_string(),
                    }
                    .into());
                };
                self.list_items = items.borrow().clone();
                self.stage = Stage::DictItems;
                Ok(())
            },
            Stage::DictItems => {
                let Value::Dict(entries) = child else {
                    return Err(Violation::SchemaMismatch {
                        path: self.path.clone(),
                        reason: "dictitems trailer must be a dict".to_string(),
                    }
                    .into());
                };
                self.dict_items = entries.borrow().clone();
                self.stage = Stage::Done;
                Ok(())
            },
            Stage::Done => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "instance frame received more children than expected".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        if self.stage != Stage::Done {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "instance frame closed before all fields arrived".to_string(),
            }
            .into());
        }
        let Some(class_name) = self.class_name.clone() else {
            return Err(
                Violation::SchemaMismatch { path: self.path.clone(), reason: "missing class name".to_string() }.into()
            );
        };
        Ok(Value::Instance(Rc::new(Instance {
            protocol: self.protocol.unwrap_or(ReduceProtocol::Two),
            class_name,
            args: Rc::new(RefCell::new(std::mem::take(&mut self.args))),
            kwargs: None,
            state: Rc::new(RefCell::new(std::mem::take(&mut self.state))),
            list_items: Rc::new(RefCell::new(std::mem::take(&mut self.list_items))),
            dict_items: Rc::new(RefCell::new(std::mem::take(&mut self.dict_items))),
        })))
    }
}

/// Which unsafe-mode name-reference opentype a [`NameUnslicer`] is
/// assembling: `module`, `class`, `function` all carry a single
/// fully-qualified name string and differ only in which [`Value`]
/// variant they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// `module` opentype.
    Module,
    /// `class` opentype.
    Class,
    /// `function` opentype.
    Function,
}

/// Unslicer for the `module`/`class`/`function` opentypes: a single
/// string body naming the referenced object.
#[derive(Debug)]
pub struct NameUnslicer {
    path: String,
    kind: NameKind,
    name: Option<String>,
}

impl NameUnslicer {
    /// Build an unslicer for a `kind` frame at `path`.
    #[must_use]
    pub fn new(path: String, kind: NameKind) -> Self {
        Self { path, kind, name: None }
    }
}

impl Unslicer for NameUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        if self.name.is_some() {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "name reference takes exactly one string body".to_string(),
            }
            .into());
        }
        match child {
            Value::Str(s) => {
                self.name = Some(s);
                Ok(())
            },
            _ => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "name reference body must be a string".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        let Some(name) = self.name.clone() else {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "name reference closed without a body".to_string(),
            }
            .into());
        };
        Ok(match self.kind {
            NameKind::Module => Value::Module(name),
            NameKind::Class => Value::Class(name),
            NameKind::Function => Value::Function(name),
        })
    }
}

/// Unslicer for the `method` opentype: a bound-method reference,
/// carrying the owning class name followed by the method name.
#[derive(Debug)]
pub struct MethodUnslicer {
    path: String,
    class: Option<String>,
    name: Option<String>,
}

impl MethodUnslicer {
    /// Build an unslicer for a `method` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path, class: None, name: None }
    }
}

impl Unslicer for MethodUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        let Value::Str(s) = child else {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "method reference fields must be strings".to_string(),
            }
            .into());
        };
        match (&self.class, &self.name) {
            (None, _) => {
                self.class = Some(s);
                Ok(())
            },
            (Some(_), None) => {
                self.name = Some(s);
                Ok(())
            },
            (Some(_), Some(_)) => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "method reference takes exactly class and name".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        match (self.class.clone(), self.name.clone()) {
            (Some(class), Some(name)) => Ok(Value::Method { class, name }),
            _ => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "method reference closed before both fields arrived".to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_class_name_is_a_violation() {
        let registry = Rc::new(ClassRegistry::new());
        let mut u = InstanceUnslicer::new("root".into(), registry);
        u.receive_child(Value::Int(2)).unwrap();
        assert!(u.receive_child(Value::Class("demo.Widget".into())).is_err());
    }

    #[test]
    fn unknown_protocol_number_is_fatal() {
        let registry = Rc::new(ClassRegistry::new());
        let mut u = InstanceUnslicer::new("root".into(), registry);
        let err = u.receive_child(Value::Int(99)).unwrap_err();
        assert!(matches!(err, crate::error::StepError::Fatal(BananaError::UnknownPickleProtocol { protocol: 99 })));
    }

    #[test]
    fn registered_class_round_trips_fields() {
        // OPEN "instance" 2 (class "demo.Widget") (tuple 1) 1 "x" 42
        // (list) (dict) CLOSE
        let mut registry = ClassRegistry::new();
        registry.register("demo.Widget", |inst| inst.clone());
        let mut u = InstanceUnslicer::new("root".into(), Rc::new(registry));
        u.receive_child(Value::Int(2)).unwrap();
        u.receive_child(Value::Class("demo.Widget".into())).unwrap();
        u.receive_child(Value::tuple(vec![Value::Int(1)])).unwrap();
        u.receive_child(Value::Int(1)).unwrap();
        u.receive_child(Value::Str("x".into())).unwrap();
        u.receive_child(Value::Int(42)).unwrap();
        u.receive_child(Value::list(vec![])).unwrap();
        u.receive_child(Value::Dict(Rc::new(RefCell::new(vec![])))).unwrap();
        let Value::Instance(inst) = u.receive_close().unwrap() else { panic!() };
        assert_eq!(inst.protocol, ReduceProtocol::Two);
        assert_eq!(inst.class_name, "demo.Widget");
        assert_eq!(inst.state.borrow().len(), 1);
    }

    #[test]
    fn name_unslicer_produces_matching_variant() {
        let mut u = NameUnslicer::new("root".into(), NameKind::Class);
        u.receive_child(Value::Str("demo.Widget".into())).unwrap();
        assert_eq!(u.receive_close().unwrap(), Value::Class("demo.Widget".to_string()));
    }

    #[test]
    fn method_unslicer_collects_class_then_name() {
        let mut u = MethodUnslicer::new("root".into());
        u.receive_child(Value::Str("demo.Widget".into())).unwrap();
        u.receive_child(Value::Str("render".into())).unwrap();
        assert_eq!(
            u.receive_close().unwrap(),
            Value::Method { class: "demo.Widget".to_string(), name: "render".to_string() }
        );
    }
}
