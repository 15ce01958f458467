//! Token encoding: turns primitive values into wire bytes.
//!
//! Vocabulary substitution happens here, not in the caller: whenever a
//! byte string or UTF-8 string matches an entry in the outgoing vocab
//! table, the vocab-indexed token is emitted instead of the literal one.
//! The decision is made just-in-time, one string at a time, rather than
//! precomputed.

use bytes::BufMut;
use num_bigint::BigUint;

use crate::{
    token::{TYPE_ABORT, TYPE_BVOCAB, TYPE_BYTES, TYPE_CLOSE, TYPE_ERROR, TYPE_FLOAT, TYPE_INT,
        TYPE_NEG, TYPE_OPEN, TYPE_STRING, TYPE_SVOCAB},
    varint::{encode_digits, encode_u64_digits},
    vocab::OutgoingVocab,
};

fn write_header(sink: &mut impl BufMut, digits: &[u8], type_byte: u8) {
    sink.put_slice(digits);
    sink.put_u8(type_byte);
}

/// Encode a non-negative integer.
pub fn encode_int(sink: &mut impl BufMut, value: &BigUint) {
    write_header(sink, &encode_digits(value), TYPE_INT);
}

/// Encode a negative integer, given its magnitude.
pub fn encode_neg(sink: &mut impl BufMut, magnitude: &BigUint) {
    write_header(sink, &encode_digits(magnitude), TYPE_NEG);
}

/// Encode an IEEE-754 double: type byte, then 8 big-endian bytes, no header.
pub fn encode_float(sink: &mut impl BufMut, value: f64) {
    sink.put_u8(TYPE_FLOAT);
    sink.put_slice(&value.to_be_bytes());
}

/// Encode a raw byte string, substituting the vocab-indexed form if
/// `value` is a registered outgoing vocab entry.
pub fn encode_bytes(sink: &mut impl BufMut, vocab: &OutgoingVocab, value: &[u8]) {
    if let Some(index) = vocab.lookup(value) {
        write_header(sink, &encode_u64_digits(index), TYPE_BVOCAB);
    } else {
        write_header(sink, &encode_u64_digits(value.len() as u64), TYPE_BYTES);
        sink.put_slice(value);
    }
}

/// Encode UTF-8 text, substituting the vocab-indexed form if `value`'s
/// bytes are a registered outgoing vocab entry.
pub fn encode_str(sink: &mut impl BufMut, vocab: &OutgoingVocab, value: &str) {
    if let Some(index) = vocab.lookup(value.as_bytes()) {
        write_header(sink, &encode_u64_digits(index), TYPE_SVOCAB);
    } else {
        write_header(sink, &encode_u64_digits(value.len() as u64), TYPE_STRING);
        sink.put_slice(value.as_bytes());
    }
}

/// Encode an OPEN frame marker with the given frame id (`count`).
pub fn encode_open(sink: &mut impl BufMut, count: u64) {
    write_header(sink, &encode_u64_digits(count), TYPE_OPEN);
}

/// Encode a CLOSE frame marker with the matching frame id.
pub fn encode_close(sink: &mut impl BufMut, count: u64) {
    write_header(sink, &encode_u64_digits(count), TYPE_CLOSE);
}

/// Encode an ABORT marker. The body carries no information of its own;
/// it is always zero.
pub fn encode_abort(sink: &mut impl BufMut) {
    write_header(sink, &encode_u64_digits(0), TYPE_ABORT);
}

/// Encode a fatal protocol-level error message.
pub fn encode_error(sink: &mut impl BufMut, message: &str) {
    write_header(sink, &encode_u64_digits(message.len() as u64), TYPE_ERROR);
    sink.put_slice(message.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::VocabTableIndex;

    #[test]
    fn encode_small_int_matches_manual_bytes() {
        let mut buf = Vec::new();
        encode_int(&mut buf, &BigUint::from(1u32));
        assert_eq!(buf, vec![1u8, TYPE_INT]);
    }

    #[test]
    fn encode_bytes_prefers_vocab() {
        let vocab = OutgoingVocab::from_initial(VocabTableIndex::V1);
        let mut buf = Vec::new();
        encode_bytes(&mut buf, &vocab, b"list");
        // index of "list" in VOCAB_V1 is 4
        assert_eq!(buf, vec![4u8, TYPE_BVOCAB]);
    }

    #[test]
    fn encode_bytes_literal_when_not_in_vocab() {
        let vocab = OutgoingVocab::from_initial(VocabTableIndex::V0);
        let mut buf = Vec::new();
        encode_bytes(&mut buf, &vocab, b"hi");
        assert_eq!(buf, vec![2u8, TYPE_BYTES, b'h', b'i']);
    }
}
