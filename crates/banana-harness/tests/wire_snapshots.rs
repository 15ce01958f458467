//! Byte-for-byte tests pinning the exact wire shape of a plain value
//! with no vocabulary compression in play, and confirming that once a
//! vocab table is installed, the three expected tokens actually go out
//! as `BVOCAB` rather than literal `BYTES`.
//!
//! These are hand-verified against the token layer's documented byte
//! grammar rather than `insta` golden files, since the whole point of
//! pinning these two cases is a small, fixed, auditable byte sequence —
//! a literal expected vector (see `encode_small_int_matches_manual_bytes`
//! and `encode_list_of_two_ints_matches_expected_shape` in
//! `banana-wire`) rather than a snapshot file.

use banana_core::{Banana, BananaConfig, ClassRegistry, Mode, Value};
use banana_wire::VocabTableIndex;

fn pump_output(banana: &mut Banana) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let chunk = banana.take_output();
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(&chunk);
        while banana.poll_event().is_some() {}
    }
    out
}

/// Whether `needle` occurs as a contiguous subsequence of `haystack`.
fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn simple_list_encodes_to_the_expected_byte_shape() {
    // encode([1, 2]) over an empty vocab table -> OPEN(0) BYTES("list")
    // INT(1) INT(2) CLOSE(0), matching the worked scenario.
    let config = BananaConfig { initial_vocab_table: VocabTableIndex::V0, ..BananaConfig::default() };
    let mut banana = Banana::new(config, ClassRegistry::new());
    banana.send(Value::list(vec![Value::Int(1), Value::Int(2)]));
    let bytes = pump_output(&mut banana);

    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x00, 0x89,                         // OPEN(0)
        0x04, 0x83, b'l', b'i', b's', b't', // BYTES("list")
        0x01, 0x81,                         // INT(1)
        0x02, 0x81,                         // INT(2)
        0x00, 0x8a,                         // CLOSE(0)
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn vocabized_send_emits_the_three_bvocab_tokens_in_nesting_order() {
    let config = BananaConfig { initial_vocab_table: VocabTableIndex::V0, mode: Mode::Safe, ..BananaConfig::default() };
    let mut banana = Banana::new(config, ClassRegistry::new());
    banana.set_vocab(vec![(0, b"list".to_vec()), (1, b"tuple".to_vec()), (2, b"dict".to_vec())]);

    // Drain the SET-VOCAB control frame before the flip takes effect,
    // same as Banana::add_vocab/set_vocab's own doc contract.
    let _ = pump_output(&mut banana);

    let dict = Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(vec![(
        Value::Str("a".to_string()),
        Value::Int(1),
    )])));
    banana.send(Value::list(vec![Value::tuple(vec![dict])]));
    let bytes = pump_output(&mut banana);

    // list, tuple, dict are vocab indices 0, 1, 2 respectively, each
    // carried as a single-byte BVOCAB header (index digit, then the
    // BVOCAB type byte), appearing in nesting order.
    assert!(contains_subsequence(&bytes, &[0x00, 0x85]), "expected a BVOCAB(0) for \"list\"");
    assert!(contains_subsequence(&bytes, &[0x01, 0x85]), "expected a BVOCAB(1) for \"tuple\"");
    assert!(contains_subsequence(&bytes, &[0x02, 0x85]), "expected a BVOCAB(2) for \"dict\"");

    let list_pos = bytes.windows(2).position(|w| w == [0x00, 0x85]).unwrap();
    let tuple_pos = bytes.windows(2).position(|w| w == [0x01, 0x85]).unwrap();
    let dict_pos = bytes.windows(2).position(|w| w == [0x02, 0x85]).unwrap();
    assert!(list_pos < tuple_pos && tuple_pos < dict_pos, "expected list, tuple, dict in nesting order");

    // Literal "list"/"tuple"/"dict" byte strings must not appear raw.
    assert!(!contains_subsequence(&bytes, b"list"));
    assert!(!contains_subsequence(&bytes, b"tuple"));
    assert!(!contains_subsequence(&bytes, b"dict"));
}
