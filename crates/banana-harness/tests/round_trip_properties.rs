//! Property-based tests for the full encode/decode loop.
//!
//! These verify that a value surviving [`banana_harness::round_trip`]
//! always comes back equal to what went in, for arbitrary generated
//! value trees, not just hand-picked examples.

use banana_core::{BananaConfig, Mode, Value};
use banana_harness::{arbitrary_value, round_trip, test_config};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_safe_mode_round_trip_is_identity(value in arbitrary_value()) {
        let config = test_config(Mode::Safe);
        let got = round_trip(&config, value.clone())
            .map_err(|e| TestCaseError::fail(e))?;
        prop_assert_eq!(got, value);
    }

    #[test]
    fn prop_round_trip_is_identity_under_v0_vocab(value in arbitrary_value()) {
        let config = BananaConfig { initial_vocab_table: banana_wire::VocabTableIndex::V0, ..test_config(Mode::Safe) };
        let got = round_trip(&config, value.clone())
            .map_err(|e| TestCaseError::fail(e))?;
        prop_assert_eq!(got, value);
    }
}

#[test]
fn empty_dict_round_trips() {
    let config = test_config(Mode::Safe);
    let value = Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(vec![])));
    let got = round_trip(&config, value.clone()).unwrap();
    assert_eq!(got, value);
}
