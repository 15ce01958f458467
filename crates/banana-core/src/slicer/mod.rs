//! The encode-side producer stack.
//!
//! Each concrete slicer advances one [`SliceStep`] at a time rather
//! than writing bytes directly: a generator-style producer's
//! suspension has no direct Rust equivalent, so the state a generator
//! would capture in local variables is instead held as `self` fields
//! on the slicer, and "yield" becomes "return a `SliceStep` and wait to
//! be polled again".

pub mod container;
pub mod instance;
pub mod reference;
pub mod root;
pub mod scalar;
pub mod vocab;

use crate::error::{StepResult, Violation};
use crate::opentype::Opentype;
use crate::value::Value;

/// A primitive unit of wire output a slicer is ready to emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// Open a new frame with the given opentype tokens, returning the
    /// frame's assigned reference id.
    Open(Opentype),
    /// Close the frame most recently opened by this slicer.
    Close,
    /// A scalar token body.
    Int(i64),
    /// An arbitrary-precision integer body.
    BigInt(num_bigint::BigInt),
    /// A float body.
    Float(f64),
    /// A byte string body.
    Bytes(Vec<u8>),
    /// A UTF-8 string body.
    Str(String),
    /// Re-emit a previously-assigned reference instead of the value
    /// itself.
    Reference(u64),
}

/// A token the driver may suspend on. Opaque to callers; only the
/// `Banana` driver interprets it, resuming the
/// originating slicer once the awaited condition is satisfied (e.g.
/// the peer has acknowledged buffer space, or a nested producer has
/// finished supplying data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwaitToken(pub u64);

/// One step of progress a slicer can report when polled.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceStep {
    /// A token is ready to emit immediately.
    Emit(Atom),
    /// Hand control to a child value's slicer; the parent will be
    /// polled again once the child is exhausted.
    Recurse(Value),
    /// The producer cannot make progress right now; resume later with
    /// the same token.
    Await(AwaitToken),
    /// This slicer has nothing left to emit.
    Done,
}

/// Drives a single value (and everything nested under it) through
/// [`SliceStep`]s until [`SliceStep::Done`].
///
/// Implementors hold whatever progress state they need (e.g. "which
/// element index am I on") as fields, since `next_step` is called
/// repeatedly rather than running to completion in one call — exactly
/// the state a Python generator would otherwise keep on its stack.
pub trait Slicer {
    /// Dotted diagnostic path to this slicer's slot, for error
    /// messages.
    fn path(&self) -> &str;

    /// Produce the next step. Returning `SliceStep::Done` more than
    /// once is a logic error in the caller, not in the slicer.
    fn next_step(&mut self) -> StepResult<SliceStep>;

    /// A child frame this slicer recursed into was aborted mid-stream.
    /// Default behavior re-raises so the failure keeps propagating
    /// toward the root: the offending slicer is aborted and, unless
    /// absorbed, the failure propagates to its parent; a container that
    /// can tolerate a missing element (none currently do) would
    /// override this to return `None` instead.
    fn child_aborted(&mut self, violation: Violation) -> Option<Violation> {
        Some(violation)
    }
}
