//! Integration-level round-trip tests for the token layer, exercising
//! only the public API (no `pub(crate)` access).

use banana_wire::{
    decoder::TokenDecoder,
    encoder,
    token::Token,
    vocab::{IncomingVocab, OutgoingVocab, VocabTableIndex},
    ReceiveBuffer,
};
use bytes::Bytes;
use num_bigint::BigUint;

fn roundtrip(bytes: Vec<u8>, incoming: &IncomingVocab) -> Vec<Token> {
    let decoder = TokenDecoder::default();
    let mut buf = ReceiveBuffer::new();
    buf.append(Bytes::from(bytes));
    let mut out = Vec::new();
    while let Some(tok) = decoder.decode_next(&mut buf, incoming).expect("decode") {
        out.push(tok);
    }
    out
}

#[test]
fn encode_list_of_two_ints_matches_expected_shape() {
    // encode([1, 2]) -> OPEN(0) "list" INT(1) INT(2) CLOSE(0)
    let outgoing = OutgoingVocab::from_initial(VocabTableIndex::V1);
    let incoming = IncomingVocab::from_initial(VocabTableIndex::V1);
    let mut buf = Vec::new();
    encoder::encode_open(&mut buf, 0);
    encoder::encode_bytes(&mut buf, &outgoing, b"list");
    encoder::encode_int(&mut buf, &BigUint::from(1u32));
    encoder::encode_int(&mut buf, &BigUint::from(2u32));
    encoder::encode_close(&mut buf, 0);

    let tokens = roundtrip(buf, &incoming);
    assert_eq!(
        tokens,
        vec![
            Token::Open(0),
            Token::Bytes(b"list".to_vec()),
            Token::Int(1u32.into()),
            Token::Int(2u32.into()),
            Token::Close(0),
        ]
    );
}

#[test]
fn vocab_negotiation_then_send_uses_new_indices() {
    // Set outgoing vocab to [list, tuple, dict], then send [({"a":1},)]
    let mut outgoing = OutgoingVocab::from_initial(VocabTableIndex::V0);
    let mut incoming = IncomingVocab::from_initial(VocabTableIndex::V0);
    let table: std::collections::HashMap<u64, Vec<u8>> = [
        (0u64, b"list".to_vec()),
        (1u64, b"tuple".to_vec()),
        (2u64, b"dict".to_vec()),
    ]
    .into_iter()
    .collect();
    outgoing.replace(table.clone());
    incoming.replace(table);

    let mut buf = Vec::new();
    encoder::encode_bytes(&mut buf, &outgoing, b"list");
    encoder::encode_bytes(&mut buf, &outgoing, b"tuple");
    encoder::encode_bytes(&mut buf, &outgoing, b"dict");

    let tokens = roundtrip(buf, &incoming);
    assert_eq!(
        tokens,
        vec![
            Token::Bytes(b"list".to_vec()),
            Token::Bytes(b"tuple".to_vec()),
            Token::Bytes(b"dict".to_vec()),
        ]
    );
}

#[test]
fn floats_roundtrip_exactly() {
    let incoming = IncomingVocab::from_initial(VocabTableIndex::V0);
    let mut buf = Vec::new();
    encoder::encode_float(&mut buf, std::f64::consts::PI);
    let tokens = roundtrip(buf, &incoming);
    assert_eq!(tokens, vec![Token::Float(std::f64::consts::PI)]);
}

#[test]
fn bigints_roundtrip_exactly() {
    let incoming = IncomingVocab::from_initial(VocabTableIndex::V0);
    let huge = BigUint::from(1u32) << 100u32;
    let mut buf = Vec::new();
    encoder::encode_int(&mut buf, &huge);
    let tokens = roundtrip(buf, &incoming);
    assert_eq!(tokens, vec![Token::Int(huge)]);
}
