//! Base-62 code alphabet and the positional encoder built on it.
//!
//! Encoding is a plain base-K conversion of a sequence value. Decoding is
//! strict: only the canonical encoding of a value is accepted, so every valid
//! code maps to exactly one sequence value and back.

use crate::error::{CoreError, Result};
use crate::shortcode::ShortCode;

/// The code alphabet. Index 0 (`'0'`) is the zero symbol used for padding.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Longest code accepted by [`Codec::decode`].
pub const MAX_CODE_LENGTH: usize = 32;

/// Number of symbols needed to represent `u64::MAX` (62^11 > 2^64).
pub const MAX_ENCODED_LENGTH: usize = 11;

const BASE: u64 = ALPHABET.len() as u64;
const INVALID: u8 = u8::MAX;
const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Stateless converter between sequence values and short codes.
///
/// `Codec` is `Copy` and holds no shared state, so it can be used from any
/// thread without synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    min_length: usize,
}

impl Codec {
    /// A codec producing the shortest possible codes.
    pub const fn new() -> Self {
        Self { min_length: 0 }
    }

    /// A codec that left-pads codes with the zero symbol up to `min_length`.
    pub fn with_min_length(min_length: usize) -> Result<Self> {
        if min_length > MAX_ENCODED_LENGTH {
            return Err(CoreError::InvalidCodeFormat(format!(
                "minimum length must be at most {MAX_ENCODED_LENGTH}, got {min_length}"
            )));
        }
        Ok(Self { min_length })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Encodes a sequence value into its short code.
    pub fn encode(&self, value: u64) -> ShortCode {
        ShortCode::new_unchecked(self.encode_str(value))
    }

    /// Decodes a short code back into the sequence value that produced it.
    pub fn decode(&self, code: &str) -> Result<u64> {
        if code.is_empty() {
            return Err(CoreError::InvalidCodeFormat("code is empty".to_string()));
        }
        if code.len() > MAX_CODE_LENGTH {
            return Err(CoreError::InvalidCodeFormat(format!(
                "length must be at most {MAX_CODE_LENGTH}, got {}",
                code.len()
            )));
        }

        let mut value: u64 = 0;
        for byte in code.bytes() {
            let digit = DECODE_TABLE[byte as usize];
            if digit == INVALID {
                return Err(CoreError::InvalidCodeFormat(format!(
                    "character {:?} is outside the code alphabet: '{code}'",
                    byte as char
                )));
            }
            value = value
                .checked_mul(BASE)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or_else(|| {
                    CoreError::InvalidCodeFormat(format!("code overflows the sequence space: '{code}'"))
                })?;
        }

        if self.encode_str(value) != code {
            return Err(CoreError::InvalidCodeFormat(format!(
                "code is not in canonical form: '{code}'"
            )));
        }

        Ok(value)
    }

    fn encode_str(&self, mut value: u64) -> String {
        let mut buf = [ALPHABET[0]; MAX_ENCODED_LENGTH];
        let mut start = buf.len();
        loop {
            start -= 1;
            buf[start] = ALPHABET[(value % BASE) as usize];
            value /= BASE;
            if value == 0 {
                break;
            }
        }

        let digits = buf.len() - start;
        let mut out = String::with_capacity(digits.max(self.min_length));
        for _ in digits..self.min_length {
            out.push(ALPHABET[0] as char);
        }
        // The buffer only ever holds alphabet bytes, which are ASCII.
        out.extend(buf[start..].iter().map(|&b| b as char));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_is_62_unique_symbols() {
        let unique: std::collections::HashSet<_> = ALPHABET.iter().collect();
        assert_eq!(unique.len(), 62);
    }

    #[test]
    fn encodes_known_values() {
        let codec = Codec::new();
        assert_eq!(codec.encode(0).as_str(), "0");
        assert_eq!(codec.encode(61).as_str(), "z");
        assert_eq!(codec.encode(62).as_str(), "10");
        assert_eq!(codec.encode(2301).as_str(), "b7");
        assert_eq!(codec.encode(3843).as_str(), "zz");
        assert_eq!(codec.encode(u64::MAX).as_str(), "LygHa16AHYF");
    }

    #[test]
    fn decode_inverts_encode() {
        let codec = Codec::new();
        let mut value = 1u64;
        while value < u64::MAX / 7 {
            let code = codec.encode(value);
            assert_eq!(codec.decode(code.as_str()).unwrap(), value);
            value = value * 7 + 3;
        }
        assert_eq!(codec.decode("LygHa16AHYF").unwrap(), u64::MAX);
    }

    #[test]
    fn min_length_pads_with_zero_symbol() {
        let codec = Codec::with_min_length(6).unwrap();
        assert_eq!(codec.encode(2301).as_str(), "0000b7");
        assert_eq!(codec.decode("0000b7").unwrap(), 2301);
        // Values wider than the minimum are not truncated.
        assert_eq!(codec.encode(u64::MAX).as_str(), "LygHa16AHYF");
    }

    #[test]
    fn min_length_is_bounded() {
        assert!(Codec::with_min_length(MAX_ENCODED_LENGTH).is_ok());
        assert!(Codec::with_min_length(MAX_ENCODED_LENGTH + 1).is_err());
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        let codec = Codec::new();
        for bad in ["b-7", "b 7", "b7!", "é", "b/7"] {
            assert!(
                matches!(codec.decode(bad), Err(CoreError::InvalidCodeFormat(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_and_oversized_codes() {
        let codec = Codec::new();
        assert!(codec.decode("").is_err());
        assert!(codec.decode(&"1".repeat(MAX_CODE_LENGTH + 1)).is_err());
    }

    #[test]
    fn rejects_overflowing_codes() {
        // One past u64::MAX in base 62.
        assert!(Codec::new().decode("LygHa16AHYG").is_err());
        assert!(Codec::new().decode("zzzzzzzzzzzz").is_err());
    }

    #[test]
    fn rejects_non_canonical_padding() {
        let plain = Codec::new();
        assert!(plain.decode("0b7").is_err());

        let padded = Codec::with_min_length(4).unwrap();
        assert!(padded.decode("b7").is_err());
        assert!(padded.decode("000b7").is_err());
        assert!(padded.decode("00b7").is_ok());
    }

    #[test]
    fn case_is_significant() {
        let codec = Codec::new();
        assert_ne!(codec.decode("b7").unwrap(), codec.decode("B7").unwrap());
    }
}
