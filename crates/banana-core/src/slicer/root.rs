//! The top-level slicer driving one `send()` call's worth of values.

use std::collections::{HashMap, VecDeque};

use crate::error::{StepResult, Violation};
use crate::opentype;
use crate::registry::Mode;
use crate::slicer::container::{DictSlicer, SeqSlicer, SetSlicer};
use crate::slicer::instance::{InstanceSlicer, MethodSlicer, NameSlicer};
use crate::slicer::scalar::ScalarSlicer;
use crate::slicer::Slicer;
use crate::value::Value;

/// Per-connection identity table, shared by every `send()` so that an
/// object sent twice across separate calls still collapses to a
/// `(reference N)` the second time: the table survives across
/// top-level sends on the same connection.
///
/// This table only tracks *lookups*; it does not allocate ids itself.
/// Every `OPEN` frame — tracked or not, since the wrapped scalars
/// (`none`/`boolean`/`unicode`/`decimal`) open a frame too — needs a
/// frame id from the same counter, so the `Banana` driver owns that
/// counter and calls [`Self::bind`] once it decides the id for a
/// newly-opened trackable frame.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    by_identity: HashMap<usize, u64>,
}

impl ReferenceTable {
    /// A fresh, empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { by_identity: HashMap::new() }
    }

    /// The reference id already bound to `value`'s identity, if this
    /// exact object has been sent (and OPENed) before.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Option<u64> {
        self.by_identity.get(&value.identity()?).copied()
    }

    /// Record that `value`'s identity now owns frame id `id`. Does
    /// nothing for values with no stable identity (scalars).
    pub fn bind(&mut self, value: &Value, id: u64) {
        if let Some(identity) = value.identity() {
            self.by_identity.insert(identity, id);
        }
    }
}

/// Drives the send queue for one connection's worth of top-level
/// `send()` calls.
///
/// Multiple top-level objects may be queued for serialization, each
/// becoming its own numbered root frame, processed strictly in FIFO
/// order.
#[derive(Debug, Default)]
pub struct RootSlicer {
    queue: VecDeque<Value>,
}

impl RootSlicer {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    /// Queue a top-level value to be sent.
    pub fn enqueue(&mut self, value: Value) {
        self.queue.push_back(value);
    }

    /// Pop the next queued top-level value, if any.
    pub fn pop(&mut self) -> Option<Value> {
        self.queue.pop_front()
    }

    /// Whether anything remains queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Build the appropriate concrete slicer for `value`, consulting
/// `refs` first so already-seen identities become `Atom::Reference`
/// rather than being recursed into again.
///
/// Returns `SlicerDispatch::Reference` when `value` collapsed to a
/// reference — the caller should emit `Atom::Reference(id)` directly
/// rather than pushing a new slicer. Otherwise the caller is
/// responsible for binding the new slicer's eventual frame id into
/// `refs` once one is assigned: reference id allocation happens at
/// `OPEN` time.
pub fn slicer_for_object(path: String, value: &Value, refs: &ReferenceTable, mode: Mode) -> StepResult<SlicerDispatch> {
    if value.is_reference_tracked() {
        if let Some(id) = refs.lookup(value) {
            return Ok(SlicerDispatch::Reference(id));
        }
    }

    if mode == Mode::Safe && is_unsafe_mode_value(value) {
        return Err(Violation::CannotSerialize { path, type_name: scalar_type_name(value) }.into());
    }

    let slicer: Box<dyn Slicer> = match value {
        Value::Seq(kind, items) => Box::new(SeqSlicer::new(path, *kind, items.clone())),
        Value::Dict(entries) => Box::new(DictSlicer::new(path, entries.clone())),
        Value::Set(items) => Box::new(SetSlicer::new(path, items.clone(), false)),
        Value::FrozenSet(items) => Box::new(SetSlicer::new(path, items.clone(), true)),
        Value::Instance(instance) => Box::new(InstanceSlicer::new(path, instance.clone())),
        Value::Module(name) => Box::new(NameSlicer::new(path, opentype::MODULE, name.clone())),
        Value::Class(name) => Box::new(NameSlicer::new(path, opentype::CLASS, name.clone())),
        Value::Function(name) => Box::new(NameSlicer::new(path, opentype::FUNCTION, name.clone())),
        Value::Method { class, name } => Box::new(MethodSlicer::new(path, class.clone(), name.clone())),
        scalar => match ScalarSlicer::try_new(path.clone(), scalar.clone()) {
            Some(s) => Box::new(s),
            None => {
                return Err(Violation::CannotSerialize { path, type_name: scalar_type_name(scalar) }.into())
            },
        },
    };
    Ok(SlicerDispatch::Slicer(slicer))
}

fn is_unsafe_mode_value(value: &Value) -> bool {
    matches!(
        value,
        Value::Instance(_) | Value::Module(_) | Value::Class(_) | Value::Function(_) | Value::Method { .. }
    )
}

/// Outcome of dispatching a value to a slicer.
pub enum SlicerDispatch {
    /// Serialize by recursing into this slicer.
    Slicer(Box<dyn Slicer>),
    /// Already seen: emit a back-reference instead.
    Reference(u64),
}

fn scalar_type_name(value: &Value) -> String {
    match value {
        Value::Module(_) => "Module".to_string(),
        Value::Class(_) => "Class".to_string(),
        Value::Function(_) => "Function".to_string(),
        Value::Method { .. } => "Method".to_string(),
        Value::Unresolved(_) => "Unresolved".to_string(),
        other => format!("{other:?}"),
    }
}
