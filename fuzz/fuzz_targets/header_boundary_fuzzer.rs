//! Fuzz target for token header boundary conditions.
//!
//! Prevent unbounded scanning on malformed headers.
//!
//! # Strategy
//!
//! - Prefix length: zero, one under the configured limit, exactly at the
//!   limit, one over, and a large random length.
//! - Type byte: a known type byte, a byte one below the known range, a
//!   byte one above it, `0x00`, `0xFF`, and a random byte.
//!
//! # Invariants
//!
//! - A prefix strictly longer than the configured limit MUST return
//!   `WireError::PrefixLimitExceeded`.
//! - An unrecognized type byte MUST return `WireError::UnknownTypeByte`,
//!   never panic.
//! - Decoding never panics regardless of prefix length or type byte.

#![no_main]

use arbitrary::Arbitrary;
use banana_wire::error::WireError;
use banana_wire::vocab::{IncomingVocab, VocabTableIndex};
use banana_wire::{ReceiveBuffer, TokenDecoder};
use libfuzzer_sys::fuzz_target;

const PREFIX_LIMIT: usize = 64;

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryHeader {
    prefix_len: PrefixLen,
    type_byte: TypeByteChoice,
}

#[derive(Debug, Clone, Arbitrary)]
enum PrefixLen {
    Zero,
    OneUnderLimit,
    AtLimit,
    OneOverLimit,
    Random(u16),
}

#[derive(Debug, Clone, Arbitrary)]
enum TypeByteChoice {
    KnownInt,
    KnownClose,
    JustBelowKnownRange,
    JustAboveKnownRange,
    Zero,
    Max,
    Random(u8),
}

fuzz_target!(|boundary: BoundaryHeader| {
    let prefix_len = match boundary.prefix_len {
        PrefixLen::Zero => 0,
        PrefixLen::OneUnderLimit => PREFIX_LIMIT - 1,
        PrefixLen::AtLimit => PREFIX_LIMIT,
        PrefixLen::OneOverLimit => PREFIX_LIMIT + 1,
        PrefixLen::Random(n) => (n as usize).min(10_000),
    };

    let type_byte = match boundary.type_byte {
        TypeByteChoice::KnownInt => banana_wire::token::TYPE_INT,
        TypeByteChoice::KnownClose => banana_wire::token::TYPE_CLOSE,
        TypeByteChoice::JustBelowKnownRange => 0x80,
        TypeByteChoice::JustAboveKnownRange => 0x8D,
        TypeByteChoice::Zero => 0x00,
        TypeByteChoice::Max => 0xFF,
        TypeByteChoice::Random(b) => b,
    };

    let mut data = vec![0u8; prefix_len];
    data.push(type_byte);

    let decoder = TokenDecoder::with_prefix_limit(PREFIX_LIMIT);
    let vocab = IncomingVocab::from_initial(VocabTableIndex::V1);
    let mut buf = ReceiveBuffer::new();
    buf.append(bytes::Bytes::from(data));

    match decoder.decode_next(&mut buf, &vocab) {
        Ok(_) => {
            assert!(prefix_len <= PREFIX_LIMIT, "a header this long must have been rejected");
        },
        Err(WireError::PrefixLimitExceeded { limit }) => {
            assert_eq!(limit, PREFIX_LIMIT);
            assert!(prefix_len > PREFIX_LIMIT);
        },
        Err(WireError::UnknownTypeByte { .. }) => {},
        Err(_) => {},
    }
});
