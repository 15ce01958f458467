//! The decode-side consumer stack.
//!
//! Each open frame owns one [`Unslicer`], fed child values bottom-up as
//! nested frames finish rather than being handed raw tokens directly —
//! token-to-scalar conversion happens once, in the driver, and every
//! `Unslicer` above that layer only ever sees [`Value`]s.

pub mod container;
pub mod instance;
pub mod reference;
pub mod root;
pub mod scalar;
pub mod vocab;

use crate::error::{StepResult, Violation};
use crate::value::{Shared, Value};

/// Where the most recently accepted child landed in a container's
/// backing storage.
///
/// The root unslicer records one of these whenever it hands a
/// container an unresolved forward reference — a late-bound reference
/// whose target is a frame that hasn't closed yet. Once the target
/// frame finally closes, the root unslicer walks every recorded site
/// and overwrites the placeholder in place.
#[derive(Debug, Clone)]
pub enum PatchSite {
    /// An element of a `list`/`tuple`/`set`/`immutable-set` backing.
    Seq {
        /// The container's backing storage.
        backing: Shared<Vec<Value>>,
        /// Index of the placeholder slot.
        index: usize,
    },
    /// The value half of a `dict` entry.
    DictValue {
        /// The container's backing storage.
        backing: Shared<Vec<(Value, Value)>>,
        /// Index of the entry whose value is the placeholder.
        index: usize,
    },
}

impl PatchSite {
    /// Overwrite the recorded slot with the now-resolved `value`.
    pub fn apply(&self, value: &Value) {
        match self {
            Self::Seq { backing, index } => {
                if let Some(slot) = backing.borrow_mut().get_mut(*index) {
                    *slot = value.clone();
                }
            },
            Self::DictValue { backing, index } => {
                if let Some((_, slot)) = backing.borrow_mut().get_mut(*index) {
                    *slot = value.clone();
                }
            },
        }
    }
}

/// Consumes child values for one open frame and produces the finished
/// [`Value`] once its `CLOSE` arrives.
pub trait Unslicer: std::fmt::Debug {
    /// Dotted diagnostic path to this frame, for error messages.
    fn path(&self) -> &str;

    /// A fully-unslicer'd child arrived (a scalar, or the completed
    /// result of a nested frame).
    fn receive_child(&mut self, child: Value) -> StepResult<()>;

    /// This frame's `CLOSE` arrived; produce the finished value.
    fn receive_close(&mut self) -> StepResult<Value>;

    /// A child frame nested under this one failed with `violation`; the
    /// parent is notified and may re-raise or resume. The default
    /// absorbs nothing and re-raises the same violation one level up; a
    /// parent
    /// that wants to swallow a child's failure and keep going (e.g. a
    /// constraint that treats a bad element as merely "skip it")
    /// overrides this to return `None`.
    fn report_violation(&mut self, violation: Violation) -> Option<Violation> {
        Some(violation)
    }

    /// Where the child most recently passed to [`Self::receive_child`]
    /// landed in this frame's backing storage, if this frame is one a
    /// [`PatchSite`] can target. Returns `None` for frames with no
    /// patchable backing (scalars) or when the last child didn't
    /// occupy a final slot yet (a dict key, still awaiting its value).
    fn last_child_site(&self) -> Option<PatchSite> {
        None
    }
}
