//! Fuzz target for the token decoder against arbitrary, untrusted bytes.
//!
//! # Strategy
//!
//! Feed raw fuzzer-supplied bytes straight into `TokenDecoder::decode_next`
//! against each of the three published initial vocab tables, one full
//! buffer at a time rather than splitting into chunks (chunk-boundary
//! behavior is covered separately by property tests in `banana-harness`).
//!
//! # Invariants
//!
//! - `decode_next` never panics on any input.
//! - Once it returns `Err`, the loop stops; it must never return `Ok(Some(_))`
//!   again without more bytes being appended first.
//! - `Ok(None)` only ever happens with the buffer non-empty and under the
//!   configured prefix limit's worth of scanned header bytes.

#![no_main]

use banana_wire::{ReceiveBuffer, TokenDecoder};
use banana_wire::vocab::{IncomingVocab, VocabTableIndex};
use libfuzzer_sys::fuzz_target;

fn drain(data: &[u8], table: VocabTableIndex) {
    let decoder = TokenDecoder::default();
    let vocab = IncomingVocab::from_initial(table);
    let mut buf = ReceiveBuffer::new();
    buf.append(bytes::Bytes::copy_from_slice(data));

    loop {
        match decoder.decode_next(&mut buf, &vocab) {
            Ok(Some(_token)) => {},
            Ok(None) => break,
            Err(_) => break,
        }
    }
}

fuzz_target!(|data: &[u8]| {
    drain(data, VocabTableIndex::V0);
    drain(data, VocabTableIndex::V1);
    drain(data, VocabTableIndex::V191);
});
