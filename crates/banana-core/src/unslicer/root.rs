//! Decode-side reference table and opentype dispatch.
//!
//! There isn't a single unslicer sitting at the bottom of the stack —
//! `Banana` (see `crate::protocol`) owns the stack directly and calls
//! [`dispatch_open`] for every `OPEN`, top-level or nested, since the
//! split between which opentypes are legal at the outermost level and
//! how they're built only restricts the former. [`ReferenceTable`] is
//! the one piece of state genuinely shared by the whole stack (every
//! nested frame's late-bound references resolve against the same
//! table), so it lives here as a standalone, `Rc<RefCell<_>>`-shared
//! type instead.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{StepResult, Violation};
use crate::opentype::{self, Opentype};
use crate::registry::{ClassRegistry, Mode};
use crate::value::{SeqKind, Value};

use super::container::{DictUnslicer, SeqUnslicer, SetUnslicer};
use super::instance::{InstanceUnslicer, MethodUnslicer, NameKind, NameUnslicer};
use super::reference::ReferenceUnslicer;
use super::scalar::{BoolUnslicer, DecimalUnslicer, NoneUnslicer, UnicodeUnslicer};
use super::vocab::{AddVocabUnslicer, ReplaceVocabUnslicer};
use super::{PatchSite, Unslicer};

/// One reference id's resolution state.
#[derive(Debug)]
pub enum ReferenceSlot {
    /// The frame that owns this id hasn't closed yet. Carries every
    /// [`PatchSite`] registered against it so far — slots that took a
    /// forward-reference placeholder and need patching once this id
    /// resolves.
    Pending(Vec<PatchSite>),
    /// The frame closed; this is its final value.
    Resolved(Value),
}

/// Per-connection map from reference id to resolution state. Reference
/// ids are assigned at `OPEN` time, before the body is emitted, so a
/// cycle back into a still-open frame finds a [`ReferenceSlot::Pending`]
/// rather than nothing at all.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    slots: HashMap<u64, ReferenceSlot>,
}

impl ReferenceTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: HashMap::new() }
    }

    /// Record that frame `id` has just been opened and is not yet
    /// resolved.
    pub fn open(&mut self, id: u64) {
        self.slots.insert(id, ReferenceSlot::Pending(Vec::new()));
    }

    /// Look up `id`'s current resolution state.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&ReferenceSlot> {
        self.slots.get(&id)
    }

    /// Register `site` to be patched once `id` resolves. A no-op if
    /// `id` is unknown or already resolved (callers only do this
    /// immediately after receiving a [`ReferenceSlot::Pending`] result
    /// for `id`, so that can't normally happen).
    pub fn register_patch(&mut self, id: u64, site: PatchSite) {
        if let Some(ReferenceSlot::Pending(sites)) = self.slots.get_mut(&id) {
            sites.push(site);
        }
    }

    /// Mark `id` resolved as `value`, applying every [`PatchSite`]
    /// registered against it while it was pending.
    pub fn close(&mut self, id: u64, value: Value) {
        let sites = match self.slots.remove(&id) {
            Some(ReferenceSlot::Pending(sites)) => sites,
            _ => Vec::new(),
        };
        for site in &sites {
            site.apply(&value);
        }
        self.slots.insert(id, ReferenceSlot::Resolved(value));
    }
}

/// Shared state every concrete unslicer constructor needs, threaded
/// through [`dispatch_open`] rather than global state: no hidden
/// process globals.
pub struct UnslicerContext {
    /// Shared reference table.
    pub references: Rc<std::cell::RefCell<ReferenceTable>>,
    /// Unsafe-mode class registry.
    pub class_registry: Rc<ClassRegistry>,
    /// Whether unsafe-mode opentypes (`instance`/`module`/`class`/
    /// `function`/`method`) are accepted on this connection.
    pub mode: Mode,
}

fn is_unsafe_mode_opentype(kind: &[u8]) -> bool {
    kind == opentype::INSTANCE
        || kind == opentype::MODULE
        || kind == opentype::CLASS
        || kind == opentype::FUNCTION
        || kind == opentype::METHOD
}

/// Build the concrete unslicer for a decoded `opentype`, at either the
/// top level or nested — unified here since both paths share the same
/// dispatch table; see the module doc comment.
///
/// `path` is the diagnostic path the returned unslicer will report.
/// `max_length`, if any, comes from the [`crate::constraint::Constraint`]
/// active at this slot and is only honored by the container kinds that
/// accept a length cap (`list`/`tuple`/`dict`).
pub fn dispatch_open(
    path: String,
    opentype: &Opentype,
    ctx: &UnslicerContext,
    max_length: Option<usize>,
) -> StepResult<Box<dyn Unslicer>> {
    let kind = opentype.first().map(Vec::as_slice).unwrap_or_default();
    if ctx.mode == Mode::Safe && is_unsafe_mode_opentype(kind) {
        return Err(Violation::SchemaMismatch {
            path,
            reason: format!("unsafe-mode opentype {:?} rejected on a safe-mode connection", kind),
        }
        .into());
    }
    let unslicer: Box<dyn Unslicer> = match kind {
        k if k == opentype::NONE => Box::new(NoneUnslicer::new(path)),
        k if k == opentype::BOOLEAN => Box::new(BoolUnslicer::new(path)),
        k if k == opentype::UNICODE => Box::new(UnicodeUnslicer::new(path)),
        k if k == opentype::DECIMAL => Box::new(DecimalUnslicer::new(path)),
        k if k == opentype::LIST => Box::new(SeqUnslicer::new(path, SeqKind::List, max_length)),
        k if k == opentype::TUPLE => Box::new(SeqUnslicer::new(path, SeqKind::Tuple, max_length)),
        k if k == opentype::DICT => Box::new(DictUnslicer::new(path, max_length)),
        k if k == opentype::SET => Box::new(SetUnslicer::new(path, false)),
        k if k == opentype::IMMUTABLE_SET => Box::new(SetUnslicer::new(path, true)),
        k if k == opentype::REFERENCE => Box::new(ReferenceUnslicer::new(path, ctx.references.clone())),
        k if k == opentype::SET_VOCAB => Box::new(ReplaceVocabUnslicer::new(path)),
        k if k == opentype::ADD_VOCAB => Box::new(AddVocabUnslicer::new(path)),
        k if k == opentype::MODULE => Box::new(NameUnslicer::new(path, NameKind::Module)),
        k if k == opentype::CLASS => Box::new(NameUnslicer::new(path, NameKind::Class)),
        k if k == opentype::FUNCTION => Box::new(NameUnslicer::new(path, NameKind::Function)),
        k if k == opentype::METHOD => Box::new(MethodUnslicer::new(path)),
        k if k == opentype::INSTANCE => Box::new(InstanceUnslicer::new(path, ctx.class_registry.clone())),
        _ => {
            return Err(Violation::SchemaMismatch {
                path,
                reason: format!("unknown OPEN type {:?}", opentype),
            }
            .into());
        },
    };
    Ok(unslicer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reference_collects_and_applies_patch_sites() {
        let mut table = ReferenceTable::new();
        table.open(5);
        assert!(matches!(table.get(5), Some(ReferenceSlot::Pending(_))));

        let backing = Rc::new(std::cell::RefCell::new(vec![Value::Unresolved(5)]));
        table.register_patch(5, PatchSite::Seq { backing: backing.clone(), index: 0 });

        table.close(5, Value::Int(99));
        assert_eq!(backing.borrow()[0], Value::Int(99));
        assert!(matches!(table.get(5), Some(ReferenceSlot::Resolved(_))));
    }

    #[test]
    fn dispatch_open_builds_known_opentypes() {
        let ctx = UnslicerContext {
            references: Rc::new(std::cell::RefCell::new(ReferenceTable::new())),
            class_registry: Rc::new(ClassRegistry::new()),
            mode: Mode::Safe,
        };
        let u = dispatch_open("root".into(), &opentype::single(opentype::LIST), &ctx, None).unwrap();
        assert_eq!(u.path(), "root");
    }

    #[test]
    fn dispatch_open_rejects_unknown_opentype() {
        let ctx = UnslicerContext {
            references: Rc::new(std::cell::RefCell::new(ReferenceTable::new())),
            class_registry: Rc::new(ClassRegistry::new()),
            mode: Mode::Safe,
        };
        assert!(dispatch_open("root".into(), &opentype::single(b"bogus"), &ctx, None).is_err());
    }

    #[test]
    fn safe_mode_rejects_instance_opentype() {
        let ctx = UnslicerContext {
            references: Rc::new(std::cell::RefCell::new(ReferenceTable::new())),
            class_registry: Rc::new(ClassRegistry::new()),
            mode: Mode::Safe,
        };
        assert!(dispatch_open("root".into(), &opentype::single(opentype::INSTANCE), &ctx, None).is_err());
    }

    #[test]
    fn unsafe_mode_accepts_instance_opentype() {
        let ctx = UnslicerContext {
            references: Rc::new(std::cell::RefCell::new(ReferenceTable::new())),
            class_registry: Rc::new(ClassRegistry::new()),
            mode: Mode::Unsafe,
        };
        assert!(dispatch_open("root".into(), &opentype::single(opentype::INSTANCE), &ctx, None).is_ok());
    }
}
