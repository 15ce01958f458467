//! Base-128 little-endian header encoding shared by every token kind.
//!
//! A header is a sequence of bytes with the high bit clear, each one
//! holding a 7-bit digit of an unsigned integer in little-endian digit
//! order. The header ends the instant a byte with the high bit set is
//! read — that byte is the token's type byte, not a digit.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::error::WireError;

/// Maximum header bytes this implementation will read before giving up.
///
/// Configurable per decoder instance (see [`crate::decoder::TokenDecoder`]);
/// this is only the type-level default.
pub const DEFAULT_PREFIX_LIMIT: usize = 64;

/// Encode `value` as base-128 little-endian digit bytes (no type byte).
///
/// Always emits at least one digit, even for zero, since an empty
/// header is reserved for token kinds that carry no integer body at
/// all (`FLOAT`).
#[must_use]
pub fn encode_digits(value: &BigUint) -> Vec<u8> {
    let digits = value.to_radix_le(128);
    if digits.is_empty() { vec![0] } else { digits }
}

/// Assemble previously-accumulated digit bytes into an unsigned integer.
#[must_use]
pub fn digits_to_biguint(digits: &[u8]) -> BigUint {
    BigUint::from_radix_le(digits, 128).unwrap_or_else(BigUint::default)
}

/// Narrow a decoded header value to `u64`, for fields (lengths, counts,
/// vocab indices) that are never meant to hold truly arbitrary
/// precision values.
pub fn digits_to_u64(digits: &[u8]) -> Result<u64, WireError> {
    digits_to_biguint(digits)
        .to_u64()
        .ok_or(WireError::HeaderValueOverflow)
}

/// Encode a `u64` header value as base-128 little-endian digits.
#[must_use]
pub fn encode_u64_digits(value: u64) -> Vec<u8> {
    encode_digits(&BigUint::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_one_digit() {
        assert_eq!(encode_u64_digits(0), vec![0]);
    }

    #[test]
    fn roundtrips_small_values() {
        for v in [0u64, 1, 127, 128, 300, 16384, u32::MAX as u64] {
            let digits = encode_u64_digits(v);
            assert!(digits.iter().all(|b| *b < 128));
            assert_eq!(digits_to_u64(&digits).unwrap(), v);
        }
    }

    #[test]
    fn roundtrips_values_beyond_u64() {
        let huge = BigUint::from(1u32) << 100u32;
        let digits = encode_digits(&huge);
        assert_eq!(digits_to_biguint(&digits), huge);
        assert!(digits_to_u64(&digits).is_err());
    }
}
