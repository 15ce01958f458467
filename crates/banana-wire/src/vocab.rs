//! Vocabulary tables: per-direction dictionaries that compress frequently
//! used byte strings (mostly opentypes) into single-byte-index tokens.
//!
//! Each connection keeps two independent [`OutgoingVocab`]/[`IncomingVocab`]
//! pairs: `outgoing` is consulted by the encoder to decide whether a byte
//! string should become a literal token or a vocab-indexed one,
//! `incoming` is consulted by the decoder to resolve a vocab index back
//! into bytes.

use std::collections::HashMap;

use sha1::{Digest, Sha1};

use crate::error::WireError;

/// One of the three published initial vocabulary tables, selected
/// before any connection-specific negotiation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabTableIndex {
    /// Table 0: empty.
    V0,
    /// Table 1: opentypes used in basic messaging.
    V1,
    /// Table 191: table 1 plus ancillary types.
    V191,
}

impl VocabTableIndex {
    /// The numeric index as negotiated on the wire.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::V0 => 0,
            Self::V1 => 1,
            Self::V191 => 191,
        }
    }

    /// The ordered list of byte strings published under this table.
    #[must_use]
    pub fn entries(self) -> &'static [&'static [u8]] {
        match self {
            Self::V0 => VOCAB_V0,
            Self::V1 => VOCAB_V1,
            Self::V191 => vocab_v191(),
        }
    }
}

#[rustfmt::skip]
const VOCAB_V0: &[&[u8]] = &[];

#[rustfmt::skip]
const VOCAB_V1: &[&[u8]] = &[
    b"none", b"boolean", b"reference",
    b"dict", b"list", b"tuple", b"set", b"immutable-set",
    b"unicode", b"set-vocab", b"add-vocab",
    b"call", b"arguments", b"answer", b"error",
    b"my-reference", b"your-reference", b"their-reference", b"copyable",
    b"instance", b"module", b"class", b"method", b"function",
    b"attrdict",
];

#[rustfmt::skip]
const VOCAB_V191_EXTRA: &[&[u8]] = &[
    b"slice", b"exception", b"uuid", b"datetime", b"timedelta", b"time",
    b"date", b"decimal",
];

fn build_vocab_v191() -> Vec<&'static [u8]> {
    let mut v = VOCAB_V1.to_vec();
    v.extend_from_slice(VOCAB_V191_EXTRA);
    v
}

// `VOCAB_V191` needs to own its concatenation; a `std::sync::OnceLock`
// keeps this allocation-free after first use without requiring a build
// script just to concatenate two slices.
fn vocab_v191() -> &'static [&'static [u8]] {
    static CELL: std::sync::OnceLock<Vec<&'static [u8]>> = std::sync::OnceLock::new();
    CELL.get_or_init(build_vocab_v191)
}

/// Hash a table's entries the same way the far end will, so both sides
/// can confirm they negotiated the same word list out of band.
#[must_use]
pub fn checksum(entries: &[&[u8]]) -> String {
    let mut hasher = Sha1::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(entry);
    }
    let digest = hasher.finalize();
    let full = hex_lower(&digest);
    full[..8].to_string()
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // `write!` to a `String` never fails.
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// The outgoing (encode-side) half of a vocabulary table.
#[derive(Debug, Default, Clone)]
pub struct OutgoingVocab {
    index_of: HashMap<Vec<u8>, u64>,
    next_index: u64,
}

impl OutgoingVocab {
    /// Build from one of the published initial tables.
    #[must_use]
    pub fn from_initial(table: VocabTableIndex) -> Self {
        let mut v = Self::default();
        for (i, entry) in table.entries().iter().enumerate() {
            let idx = u64::try_from(i).unwrap_or(u64::MAX);
            v.index_of.insert((*entry).to_vec(), idx);
            v.next_index = v.next_index.max(idx + 1);
        }
        v
    }

    /// The vocab index for `value`, if one is registered.
    #[must_use]
    pub fn lookup(&self, value: &[u8]) -> Option<u64> {
        self.index_of.get(value).copied()
    }

    /// Atomically replace the whole table (the `set-vocab` frame).
    pub fn replace(&mut self, table: HashMap<u64, Vec<u8>>) {
        self.index_of = table.into_iter().map(|(idx, v)| (v, idx)).collect();
        self.next_index = self.index_of.values().copied().max().map_or(0, |m| m + 1);
    }

    /// Allocate the next free index for `value` (the `add-vocab` frame)
    /// and register it. Returns the allocated index.
    pub fn add(&mut self, value: Vec<u8>) -> u64 {
        let idx = self.next_index;
        self.next_index += 1;
        self.index_of.insert(value, idx);
        idx
    }
}

/// The incoming (decode-side) half of a vocabulary table.
#[derive(Debug, Default, Clone)]
pub struct IncomingVocab {
    value_of: HashMap<u64, Vec<u8>>,
}

impl IncomingVocab {
    /// Build from one of the published initial tables.
    #[must_use]
    pub fn from_initial(table: VocabTableIndex) -> Self {
        let mut v = Self::default();
        for (i, entry) in table.entries().iter().enumerate() {
            let idx = u64::try_from(i).unwrap_or(u64::MAX);
            v.value_of.insert(idx, (*entry).to_vec());
        }
        v
    }

    /// Resolve `index` to its registered byte string.
    pub fn lookup(&self, index: u64) -> Result<&[u8], WireError> {
        self.value_of.get(&index).map(Vec::as_slice).ok_or(WireError::UnknownVocabIndex { index })
    }

    /// Atomically replace the whole table (the `set-vocab` frame).
    pub fn replace(&mut self, table: HashMap<u64, Vec<u8>>) {
        self.value_of = table;
    }

    /// Register one new entry (the `add-vocab` frame).
    pub fn add(&mut self, index: u64, value: Vec<u8>) {
        self.value_of.insert(index, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksums_match_published_values() {
        assert_eq!(checksum(VocabTableIndex::V0.entries()), "da39a3ee");
        assert_eq!(checksum(VocabTableIndex::V1.entries()), "bb3393bb");
        assert_eq!(checksum(VocabTableIndex::V191.entries()), "c55dc3b2");
    }

    #[test]
    fn add_allocates_monotonically() {
        let mut out = OutgoingVocab::from_initial(VocabTableIndex::V0);
        let a = out.add(b"foo".to_vec());
        let b = out.add(b"bar".to_vec());
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(out.lookup(b"foo"), Some(0));
    }

    #[test]
    fn incoming_and_outgoing_initial_tables_agree() {
        let out = OutgoingVocab::from_initial(VocabTableIndex::V1);
        let inc = IncomingVocab::from_initial(VocabTableIndex::V1);
        for (i, entry) in VocabTableIndex::V1.entries().iter().enumerate() {
            let idx = i as u64;
            assert_eq!(out.lookup(entry), Some(idx));
            assert_eq!(inc.lookup(idx).unwrap(), *entry);
        }
    }
}
