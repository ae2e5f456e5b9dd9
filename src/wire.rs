//! Conversions between native numerics/strings and the Cairo calldata wire
//! formats (felt252, u256, ByteArray).
//!
//! Everything here is pure and deterministic; the contract-facing modules
//! build on these primitives.

use rand::Rng;
use starknet::core::types::Felt;

use crate::error::SwitchboardError;

/// Number of payload bytes a single ByteArray word carries.
pub const WORD_BYTES: usize = 31;

const WORD_HEX_DIGITS: usize = WORD_BYTES * 2;

/// Largest f64 that still represents every integer below it exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Strip an optional `0x` prefix.
pub fn trim_hex_prefix(hex: &str) -> &str {
    hex.strip_prefix("0x").unwrap_or(hex)
}

/// Unsigned 256-bit integer in the contract's two-limb representation.
///
/// Invariant: `value = high * 2^128 + low`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Uint256 {
    pub low: u128,
    pub high: u128,
}

impl Uint256 {
    pub const ZERO: Uint256 = Uint256 { low: 0, high: 0 };

    /// Parse a hex string (with or without `0x` prefix) into limbs.
    pub fn from_hex(hex: &str) -> Result<Self, SwitchboardError> {
        let digits = trim_hex_prefix(hex);
        if digits.is_empty() {
            return Err(SwitchboardError::InvalidHex("empty uint256".to_string()));
        }
        if digits.len() > 64 {
            return Err(SwitchboardError::InvalidHex(format!(
                "{} hex digits exceed 256 bits",
                digits.len()
            )));
        }
        let (high, low) = if digits.len() > 32 {
            digits.split_at(digits.len() - 32)
        } else {
            ("", digits)
        };
        let low = u128::from_str_radix(low, 16)
            .map_err(|e| SwitchboardError::InvalidHex(format!("uint256 low limb: {e}")))?;
        let high = if high.is_empty() {
            0
        } else {
            u128::from_str_radix(high, 16)
                .map_err(|e| SwitchboardError::InvalidHex(format!("uint256 high limb: {e}")))?
        };
        Ok(Self { low, high })
    }

    /// Minimal hex form, no `0x` prefix (matches the decimal-string/hex
    /// conventions of the contract tooling).
    pub fn to_hex(&self) -> String {
        if self.high == 0 {
            format!("{:x}", self.low)
        } else {
            format!("{:x}{:032x}", self.high, self.low)
        }
    }

    /// Fixed-width 64-digit hex form, no `0x` prefix.
    pub fn to_padded_hex(&self) -> String {
        format!("{:032x}{:032x}", self.high, self.low)
    }

    pub fn from_bytes_be(bytes: &[u8; 32]) -> Self {
        Self {
            high: u128::from_be_bytes(bytes[..16].try_into().expect("16 bytes")),
            low: u128::from_be_bytes(bytes[16..].try_into().expect("16 bytes")),
        }
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..16].copy_from_slice(&self.high.to_be_bytes());
        out[16..].copy_from_slice(&self.low.to_be_bytes());
        out
    }
}

/// Numeric value accepted by [`numeric_to_hex`].
#[derive(Clone, Copy, Debug)]
pub enum Numeric {
    U64(u64),
    U128(u128),
    /// Only exactly-representable non-negative integers convert; anything
    /// else fails with [`SwitchboardError::PrecisionLoss`].
    Float(f64),
    Uint256(Uint256),
}

/// Convert a numeric value to its minimal hex form (no `0x` prefix).
pub fn numeric_to_hex(value: Numeric) -> Result<String, SwitchboardError> {
    match value {
        Numeric::U64(v) => Ok(format!("{v:x}")),
        Numeric::U128(v) => Ok(format!("{v:x}")),
        Numeric::Float(v) => {
            if !v.is_finite() || v.fract() != 0.0 || !(0.0..=MAX_SAFE_INTEGER).contains(&v) {
                return Err(SwitchboardError::PrecisionLoss(format!(
                    "{v} is not a safe integer"
                )));
            }
            Ok(format!("{:x}", v as u64))
        }
        Numeric::Uint256(v) => Ok(v.to_hex()),
    }
}

/// The contract's compact byte-sequence representation: full 31-byte words
/// plus one partial trailing word.
///
/// Invariant: every word in `data` holds exactly [`WORD_BYTES`] bytes and
/// `pending_word_len < 31`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteArray {
    pub data: Vec<Felt>,
    pub pending_word: Felt,
    pub pending_word_len: u32,
}

impl ByteArray {
    /// Build from a hex string (optional `0x` prefix, even digit count).
    pub fn from_hex(hex: &str) -> Result<Self, SwitchboardError> {
        let digits = trim_hex_prefix(hex);
        if digits.len() % 2 != 0 {
            return Err(SwitchboardError::InvalidHex(format!(
                "odd number of hex digits: {}",
                digits.len()
            )));
        }
        let mut data = Vec::with_capacity(digits.len() / WORD_HEX_DIGITS);
        let mut pending_word = Felt::ZERO;
        let mut pending_word_len = 0u32;
        for chunk in digits.as_bytes().chunks(WORD_HEX_DIGITS) {
            let chunk = std::str::from_utf8(chunk)
                .map_err(|_| SwitchboardError::InvalidHex("non-ascii hex input".to_string()))?;
            let word = Felt::from_hex(&format!("0x{chunk}"))
                .map_err(|e| SwitchboardError::InvalidHex(format!("{chunk:?}: {e}")))?;
            if chunk.len() == WORD_HEX_DIGITS {
                data.push(word);
            } else {
                pending_word = word;
                pending_word_len = (chunk.len() / 2) as u32;
            }
        }
        Ok(Self {
            data,
            pending_word,
            pending_word_len,
        })
    }

    /// Total payload length in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() * WORD_BYTES + self.pending_word_len as usize
    }

    /// Decode back to the raw byte sequence.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for word in &self.data {
            out.extend_from_slice(&word.to_bytes_be()[32 - WORD_BYTES..]);
        }
        let pending = self.pending_word.to_bytes_be();
        out.extend_from_slice(&pending[32 - self.pending_word_len as usize..]);
        out
    }

    /// Decode back to a `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Interpret a felt as u128, failing if it exceeds 128 bits.
pub fn felt_to_u128(felt: &Felt) -> Result<u128, SwitchboardError> {
    let bytes = felt.to_bytes_be();
    if bytes[..16].iter().any(|b| *b != 0) {
        return Err(SwitchboardError::Decode(format!(
            "felt {felt:#x} exceeds u128"
        )));
    }
    Ok(u128::from_be_bytes(bytes[16..].try_into().expect("16 bytes")))
}

/// Interpret a felt as u64, failing if it exceeds 64 bits.
pub fn felt_to_u64(felt: &Felt) -> Result<u64, SwitchboardError> {
    let bytes = felt.to_bytes_be();
    if bytes[..24].iter().any(|b| *b != 0) {
        return Err(SwitchboardError::Decode(format!(
            "felt {felt:#x} exceeds u64"
        )));
    }
    Ok(u64::from_be_bytes(bytes[24..].try_into().expect("8 bytes")))
}

/// Interpret a felt as a Cairo i128 (negative values are encoded as
/// `PRIME - |v|`).
pub fn felt_to_i128(felt: &Felt) -> Result<i128, SwitchboardError> {
    if let Ok(v) = felt_to_u128(felt) {
        if v <= i128::MAX as u128 {
            return Ok(v as i128);
        }
        return Err(SwitchboardError::Decode(format!(
            "felt {felt:#x} exceeds i128"
        )));
    }
    let magnitude = felt_to_u128(&(-*felt)).map_err(|_| {
        SwitchboardError::Decode(format!("felt {felt:#x} is not a valid i128"))
    })?;
    if magnitude == 1u128 << 127 {
        Ok(i128::MIN)
    } else if magnitude <= i128::MAX as u128 {
        Ok(-(magnitude as i128))
    } else {
        Err(SwitchboardError::Decode(format!(
            "felt {felt:#x} exceeds i128"
        )))
    }
}

/// Encode an ASCII string of at most 31 characters as a felt252 short string.
pub fn encode_short_string(s: &str) -> Result<Felt, SwitchboardError> {
    if !s.is_ascii() || s.len() > WORD_BYTES {
        return Err(SwitchboardError::Configuration(format!(
            "short string must be at most 31 ASCII characters: {s:?}"
        )));
    }
    Ok(Felt::from_bytes_be_slice(s.as_bytes()))
}

/// Decode a felt252 short string back to text.
pub fn decode_short_string(felt: &Felt) -> String {
    let bytes = felt.to_bytes_be();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

/// Random 31-byte identifier as a `0x`-prefixed 62-digit hex string.
pub fn random_id() -> String {
    let mut bytes = [0u8; WORD_BYTES];
    rand::rng().fill(&mut bytes[..]);
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint256_hex_round_trip() {
        for hex in [
            "1",
            "ff",
            "100000000000000000000000000000000",
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            "86807068432f186a147cf0b13a30067d386204ea9d6c8b04743ac2ef010b0752",
        ] {
            let parsed = Uint256::from_hex(hex).unwrap();
            assert_eq!(parsed.to_hex(), hex);
            assert_eq!(Uint256::from_bytes_be(&parsed.to_bytes_be()), parsed);
        }
    }

    #[test]
    fn test_uint256_limb_split() {
        let v = Uint256::from_hex("0x100000000000000000000000000000001").unwrap();
        assert_eq!(v.high, 1);
        assert_eq!(v.low, 1);

        let v = Uint256::from_hex("0xff").unwrap();
        assert_eq!(v.high, 0);
        assert_eq!(v.low, 0xff);
    }

    #[test]
    fn test_uint256_rejects_oversized_and_invalid() {
        assert!(matches!(
            Uint256::from_hex(&"f".repeat(65)),
            Err(SwitchboardError::InvalidHex(_))
        ));
        assert!(matches!(
            Uint256::from_hex("0xzz"),
            Err(SwitchboardError::InvalidHex(_))
        ));
        assert!(matches!(
            Uint256::from_hex("0x"),
            Err(SwitchboardError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_numeric_to_hex() {
        assert_eq!(numeric_to_hex(Numeric::U64(255)).unwrap(), "ff");
        assert_eq!(
            numeric_to_hex(Numeric::U128(1u128 << 100)).unwrap(),
            format!("{:x}", 1u128 << 100)
        );
        assert_eq!(numeric_to_hex(Numeric::Float(16.0)).unwrap(), "10");
        assert_eq!(
            numeric_to_hex(Numeric::Uint256(Uint256 { low: 1, high: 1 })).unwrap(),
            "100000000000000000000000000000001"
        );
    }

    #[test]
    fn test_numeric_to_hex_rejects_unsafe_floats() {
        for v in [0.5, -1.0, f64::NAN, f64::INFINITY, 2f64.powi(53) + 2.0] {
            assert!(matches!(
                numeric_to_hex(Numeric::Float(v)),
                Err(SwitchboardError::PrecisionLoss(_))
            ));
        }
    }

    #[test]
    fn test_byte_array_empty() {
        let ba = ByteArray::from_hex("0x").unwrap();
        assert!(ba.data.is_empty());
        assert_eq!(ba.pending_word, Felt::ZERO);
        assert_eq!(ba.pending_word_len, 0);
        assert_eq!(ba.to_hex(), "0x");
    }

    #[test]
    fn test_byte_array_exact_word_multiple() {
        let hex = format!("0x{}", "ab".repeat(62));
        let ba = ByteArray::from_hex(&hex).unwrap();
        assert_eq!(ba.data.len(), 2);
        assert_eq!(ba.pending_word, Felt::ZERO);
        assert_eq!(ba.pending_word_len, 0);
        assert_eq!(ba.to_hex(), hex);
    }

    #[test]
    fn test_byte_array_partial_word() {
        // 33 bytes: one full word plus a 2-byte pending word
        let hex = format!("0x{}beef", "01".repeat(31));
        let ba = ByteArray::from_hex(&hex).unwrap();
        assert_eq!(ba.data.len(), 1);
        assert_eq!(ba.pending_word, Felt::from(0xbeefu32));
        assert_eq!(ba.pending_word_len, 2);
        assert_eq!(ba.byte_len(), 33);
        assert_eq!(ba.to_hex(), hex);
    }

    #[test]
    fn test_byte_array_round_trip_preserves_leading_zeros() {
        let hex = "0x0000deadbeef";
        let ba = ByteArray::from_hex(hex).unwrap();
        assert_eq!(ba.pending_word_len, 6);
        assert_eq!(ba.to_hex(), hex);
    }

    #[test]
    fn test_byte_array_rejects_odd_digit_count() {
        assert!(matches!(
            ByteArray::from_hex("0xabc"),
            Err(SwitchboardError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_byte_array_accepts_prefixless_input() {
        assert_eq!(ByteArray::from_hex("beef").unwrap().byte_len(), 2);
    }

    #[test]
    fn test_felt_narrowing() {
        assert_eq!(felt_to_u64(&Felt::from(42u64)).unwrap(), 42);
        assert_eq!(felt_to_u128(&Felt::from(u128::MAX)).unwrap(), u128::MAX);
        assert!(matches!(
            felt_to_u64(&Felt::from(u128::MAX)),
            Err(SwitchboardError::Decode(_))
        ));
        assert!(matches!(
            felt_to_u128(&Felt::MAX),
            Err(SwitchboardError::Decode(_))
        ));
    }

    #[test]
    fn test_felt_to_i128() {
        assert_eq!(felt_to_i128(&Felt::from(7u64)).unwrap(), 7);
        assert_eq!(felt_to_i128(&(-Felt::from(7u64))).unwrap(), -7);
        assert_eq!(felt_to_i128(&Felt::ZERO).unwrap(), 0);
        assert_eq!(
            felt_to_i128(&(-Felt::from(i128::MAX as u128 + 1))).unwrap(),
            i128::MIN
        );
    }

    #[test]
    fn test_short_string_round_trip() {
        let felt = encode_short_string("BTC/USD").unwrap();
        assert_eq!(decode_short_string(&felt), "BTC/USD");
        assert!(encode_short_string(&"x".repeat(32)).is_err());
    }

    #[test]
    fn test_random_id_shape() {
        let id = random_id();
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 2 + 62);
        assert!(id[2..].bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(random_id(), id);
    }
}
