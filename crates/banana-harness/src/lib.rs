//! Shared test tooling for `banana-wire` and `banana-core`: proptest
//! strategies for generating arbitrary [`Value`] trees, and a
//! loopback helper that drives two [`Banana`] connections against each
//! other the way a real pair of peers would.
//!
//! Downstream tests (in this crate's own `tests/` directory, or in
//! `banana-core`/`banana-wire` themselves) build on these rather than
//! hand-rolling their own fixtures, mirroring how the rest of the
//! workspace centralizes model/property helpers in one harness crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use banana_core::{Banana, BananaConfig, ClassRegistry, Mode, SendOutcome, Value};
use banana_core::protocol::Event;
use proptest::prelude::*;

/// Build a [`BananaConfig`] suitable for loopback tests: a generous but
/// finite frame-depth cap so a pathological generated value can't hang
/// a test, matching whatever `mode` the caller needs.
#[must_use]
pub fn test_config(mode: Mode) -> BananaConfig {
    BananaConfig { max_frame_depth: Some(64), mode, ..BananaConfig::default() }
}

/// Drive `value` through a pair of loopback [`Banana`] connections
/// configured identically, and return whatever the receiving side
/// produced as its single top-level [`Event::Received`] value.
///
/// Panics (via `prop_assert`-friendly `Result`) if the send was
/// aborted, if the receiver reported a violation, or if more or fewer
/// than one value arrived — callers that expect a violation should
/// drive the pump manually instead of reaching for this helper.
///
/// # Errors
///
/// Returns `Err` describing what went wrong instead of the round-
/// tripped value, so callers can fold it into a `prop_assert`.
pub fn round_trip(config: &BananaConfig, value: Value) -> Result<Value, String> {
    let mut sender = Banana::new(config.clone(), ClassRegistry::new());
    let mut receiver = Banana::new(config.clone(), ClassRegistry::new());

    let handle = sender.send(value);

    let mut received = None;
    let mut sent_outcome = None;
    let mut safety_valve = 0usize;
    loop {
        safety_valve += 1;
        if safety_valve > 10_000 {
            return Err("loopback pump did not converge".to_string());
        }

        let chunk = sender.take_output();
        if !chunk.is_empty() {
            receiver.data_received(chunk);
        }

        let mut progressed = false;
        while let Some(event) = sender.poll_event() {
            progressed = true;
            if let Event::Sent(h, outcome) = event {
                if h == handle {
                    sent_outcome = Some(outcome);
                }
            }
        }
        while let Some(event) = receiver.poll_event() {
            progressed = true;
            match event {
                Event::Received(v) => received = Some(v),
                Event::ViolationReported(v) => return Err(format!("receiver reported a violation: {v:?}")),
                Event::Sent(..) => {},
            }
        }

        if sent_outcome.is_some() && received.is_some() {
            break;
        }
        if !progressed && chunk.is_empty() {
            break;
        }
    }

    match sent_outcome {
        Some(SendOutcome::Aborted(v)) => return Err(format!("send was aborted: {v:?}")),
        Some(SendOutcome::Sent) => {},
        None => return Err("send never reached a terminal outcome".to_string()),
    }
    received.ok_or_else(|| "receiver never produced a value".to_string())
}

/// Proptest strategy for scalar (non-container) [`Value`]s: the leaves
/// of any generated tree.
fn arbitrary_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::None),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Float),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        ".{0,32}".prop_map(Value::Str),
    ]
}

/// Proptest strategy for arbitrary [`Value`] trees, bounded in depth
/// and width so shrinking terminates and loopback tests stay fast.
/// Containers never alias each other or themselves (no cycles) — cycle
/// behavior is exercised by hand-built fixtures instead, since proptest
/// has no natural way to generate shared `Rc` identity.
#[must_use]
pub fn arbitrary_value() -> impl Strategy<Value = Value> {
    arbitrary_scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::list),
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::tuple),
            prop::collection::vec((inner.clone(), inner.clone()), 0..8).prop_map(|pairs| {
                Value::Dict(Rc::new(RefCell::new(dedup_keys(pairs))))
            }),
        ]
    })
}

fn dedup_keys(pairs: Vec<(Value, Value)>) -> Vec<(Value, Value)> {
    let mut out: Vec<(Value, Value)> = Vec::new();
    'pairs: for (k, v) in pairs {
        if !k.is_hashable() {
            continue;
        }
        for (existing_k, _) in &out {
            if *existing_k == k {
                continue 'pairs;
            }
        }
        out.push((k, v));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_helper_agrees_on_a_simple_list() {
        let config = test_config(Mode::Safe);
        let value = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let got = round_trip(&config, value.clone()).unwrap();
        assert_eq!(got, value);
    }
}
