//! Slicers for the two in-band vocabulary-negotiation frames.

use std::collections::VecDeque;

use crate::error::StepResult;
use crate::opentype;
use crate::slicer::{Atom, SliceStep, Slicer};

/// Replaces the entire outgoing vocabulary table in one frame.
///
/// The new table is sent sorted by index so the peer can apply it
/// incrementally, and — critically — the frame itself is encoded
/// against the *old* table, flipping to the new one only once the
/// frame closes: an in-flight set-vocab frame must not reference its
/// own new entries.
#[derive(Debug)]
pub struct ReplaceVocabSlicer {
    path: String,
    steps: VecDeque<Atom>,
}

impl ReplaceVocabSlicer {
    /// Build a slicer for a `set-vocab` frame carrying `entries`
    /// (already sorted by target index).
    #[must_use]
    pub fn new(path: String, entries: Vec<(u64, Vec<u8>)>) -> Self {
        let mut steps = VecDeque::new();
        steps.push_back(Atom::Open(opentype::single(opentype::SET_VOCAB)));
        for (index, word) in entries {
            steps.push_back(Atom::Int(i64::try_from(index).unwrap_or(i64::MAX)));
            steps.push_back(Atom::Bytes(word));
        }
        steps.push_back(Atom::Close);
        Self { path, steps }
    }
}

impl Slicer for ReplaceVocabSlicer {
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

/// Adds a single new entry to the outgoing vocabulary table.
///
/// Mirrors `AddVocabSlicer`: the caller must allocate the new index
/// via `OutgoingVocab::add` *before* constructing this slicer, so the
/// frame body's own reference (if any) can never collide with the
/// entry it is still defining.
#[derive(Debug)]
pub struct AddVocabSlicer {
    path: String,
    steps: VecDeque<Atom>,
}

impl AddVocabSlicer {
    /// Build a slicer for an `add-vocab` frame defining `index` as
    /// `word`.
    #[must_use]
    pub fn new(path: String, index: u64, word: Vec<u8>) -> Self {
        let steps = VecDeque::from([
            Atom::Open(opentype::single(opentype::ADD_VOCAB)),
            Atom::Int(i64::try_from(index).unwrap_or(i64::MAX)),
            Atom::Bytes(word),
            Atom::Close,
        ]);
        Self { path, steps }
    }
}

impl Slicer for AddVocabSlicer {
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

    fn drain(mut s: impl Slicer) -> Vec<Atom> {
        let mut out = Vec::new();
        loop {
            match s.next_step().unwrap() {
                SliceStep::Emit(a) => out.push(a),
                SliceStep::Done => break,
                other => panic!("unexpected {other:?}"),
            }
        }
        out
    }

    #[test]
    fn add_vocab_emits_index_then_word() {
        let s = AddVocabSlicer::new("root".into(), 27, b"widget".to_vec());
        assert_eq!(
            drain(s),
            vec![
                Atom::Open(opentype::single(opentype::ADD_VOCAB)),
                Atom::Int(27),
                Atom::Bytes(b"widget".to_vec()),
                Atom::Close,
            ]
        );
    }

    #[test]
    fn replace_vocab_emits_all_pairs_sorted() {
        let s = ReplaceVocabSlicer::new(
            "root".into(),
            vec![(0, b"list".to_vec()), (1, b"tuple".to_vec())],
        );
        let atoms = drain(s);
        assert_eq!(atoms.first(), Some(&Atom::Open(opentype::single(opentype::SET_VOCAB))));
        assert_eq!(atoms.last(), Some(&Atom::Close));
        assert_eq!(atoms.len(), 6);
    }
}
