//! Slicer for the `reference` opentype.
//!
//! Emitted instead of recursing into a value whose identity
//! [`crate::slicer::root::ReferenceTable`] already has bound to an
//! earlier frame id.

use std::collections::VecDeque;

use crate::error::StepResult;
use crate::opentype;

use super::{Atom, SliceStep, Slicer};

/// Slicer for a `reference` frame naming a previously-opened frame id.
#[derive(Debug)]
pub struct ReferenceSlicer {
    path: String,
    steps: VecDeque<Atom>,
}

impl ReferenceSlicer {
    /// Build a slicer for a `(reference target)` frame at `path`.
    #[must_use]
    pub fn new(path: String, target: u64) -> Self {
        let steps = VecDeque::from([
            Atom::Open(opentype::single(opentype::REFERENCE)),
            Atom::Reference(target),
            Atom::Close,
        ]);
        Self { path, steps }
    }
}

impl Slicer for ReferenceSlicer {
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
mod tests {
    use super::*;

    #[test]
    fn emits_open_reference_close() {
        let mut s = ReferenceSlicer::new("root".into(), 7);
        assert_eq!(
            s.next_step().unwrap(),
            SliceStep::Emit(Atom::Open(opentype::single(opentype::REFERENCE)))
        );
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Reference(7)));
        assert_eq!(s.next_step().unwrap(), SliceStep::Emit(Atom::Close));
        assert_eq!(s.next_step().unwrap(), SliceStep::Done);
    }
}
