//! Assembles signed oracle responses into the flat update records the
//! contract's `update_feed_data` entry point verifies.
//!
//! The record layout is fixed by the deployed verifier; field order and
//! widths here cannot change independently of the contract.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::SwitchboardError;
use crate::wire::{ByteArray, Uint256, WORD_BYTES, trim_hex_prefix};

/// Record discriminator for a feed value update.
pub const FEED_UPDATE_DISCRIMINATOR: u8 = 1;
/// Record discriminator for a randomness reveal.
pub const RANDOMNESS_REVEAL_DISCRIMINATOR: u8 = 3;

const SIGNATURE_COMPONENT_BYTES: usize = 32;
const FEED_ID_HEX_DIGITS: usize = WORD_BYTES * 2;

/// feed_id(32) + discriminator(1) + value(16) + timestamp(8) + r(32) + s(32)
/// + v(1) + block_number(32)
const FEED_UPDATE_RECORD_BYTES: usize = 32 + 1 + 16 + 8 + 32 + 32 + 1 + 32;

/// randomness_id(32) + discriminator(1) + value(32) + r(32) + s(32) + v(1)
const RANDOMNESS_RECORD_BYTES: usize = 32 + 1 + 32 + 32 + 32 + 1;

/// One oracle's signed evaluation of a feed, as returned by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedResponse {
    /// Decimal i128 string.
    pub value: String,
    pub timestamp: Option<u64>,
    /// Base64-encoded 65-byte ECDSA signature (r ‖ s ‖ v).
    pub signature: String,
    pub recovery_id: u8,
}

/// A serialized update ready for submission, in both hex and calldata form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRecord {
    pub hex: String,
    pub wire: ByteArray,
}

struct SignatureParts {
    r: [u8; SIGNATURE_COMPONENT_BYTES],
    s: [u8; SIGNATURE_COMPONENT_BYTES],
}

fn split_signature(signature: &str) -> Result<SignatureParts, SwitchboardError> {
    let bytes = BASE64
        .decode(signature)
        .map_err(|e| SwitchboardError::MalformedSignature(format!("base64 decode failed: {e}")))?;
    if bytes.len() < 2 * SIGNATURE_COMPONENT_BYTES {
        return Err(SwitchboardError::MalformedSignature(format!(
            "expected at least 64 bytes, got {}",
            bytes.len()
        )));
    }
    let mut parts = SignatureParts {
        r: [0; SIGNATURE_COMPONENT_BYTES],
        s: [0; SIGNATURE_COMPONENT_BYTES],
    };
    parts.r.copy_from_slice(&bytes[..SIGNATURE_COMPONENT_BYTES]);
    parts
        .s
        .copy_from_slice(&bytes[SIGNATURE_COMPONENT_BYTES..2 * SIGNATURE_COMPONENT_BYTES]);
    Ok(parts)
}

/// The on-chain feed id: the 31-byte aggregator id with one zero byte
/// appended.
fn feed_id_bytes(aggregator_id: &str) -> Result<[u8; 32], SwitchboardError> {
    let digits = trim_hex_prefix(aggregator_id);
    if digits.len() != FEED_ID_HEX_DIGITS {
        return Err(SwitchboardError::InvalidHex(format!(
            "aggregator id must be {WORD_BYTES} bytes, got {} hex digits",
            digits.len()
        )));
    }
    let raw = hex::decode(digits).map_err(|e| SwitchboardError::InvalidHex(e.to_string()))?;
    let mut id = [0u8; 32];
    id[..WORD_BYTES].copy_from_slice(&raw);
    Ok(id)
}

/// Serialize one signed response into a feed update record.
pub fn encode_feed_update(
    aggregator_id: &str,
    response: &SignedResponse,
) -> Result<String, SwitchboardError> {
    let id = feed_id_bytes(aggregator_id)?;
    let value: i128 = response.value.trim().parse().map_err(|_| {
        SwitchboardError::PrecisionLoss(format!(
            "oracle value {:?} does not fit in i128",
            response.value
        ))
    })?;
    let sig = split_signature(&response.signature)?;

    let mut buf = Vec::with_capacity(FEED_UPDATE_RECORD_BYTES);
    buf.extend_from_slice(&id);
    buf.push(FEED_UPDATE_DISCRIMINATOR);
    buf.extend_from_slice(&value.to_be_bytes());
    // A response without a timestamp keeps the upstream zero sentinel.
    buf.extend_from_slice(&response.timestamp.unwrap_or(0).to_be_bytes());
    buf.extend_from_slice(&sig.r);
    buf.extend_from_slice(&sig.s);
    buf.push(response.recovery_id);
    // Block number is stamped by the contract at verification time.
    buf.extend_from_slice(&[0u8; 32]);
    Ok(format!("0x{}", hex::encode(buf)))
}

/// Serialize a randomness reveal into its update record.
pub fn encode_randomness_reveal(
    randomness_id: &Uint256,
    value: &[u8],
    signature: &str,
    recovery_id: u8,
) -> Result<String, SwitchboardError> {
    if value.len() > 32 {
        return Err(SwitchboardError::Decode(format!(
            "randomness value of {} bytes exceeds 32",
            value.len()
        )));
    }
    let sig = split_signature(signature)?;

    let mut buf = Vec::with_capacity(RANDOMNESS_RECORD_BYTES);
    buf.extend_from_slice(&randomness_id.to_bytes_be());
    buf.push(RANDOMNESS_REVEAL_DISCRIMINATOR);
    buf.extend_from_slice(&vec![0u8; 32 - value.len()]);
    buf.extend_from_slice(value);
    buf.extend_from_slice(&sig.r);
    buf.extend_from_slice(&sig.s);
    buf.push(recovery_id);
    Ok(format!("0x{}", hex::encode(buf)))
}

/// Order responses by timestamp and serialize each into an update record.
///
/// All-or-nothing: the first malformed response aborts the whole batch.
/// The sort is stable, so responses sharing a timestamp keep their gateway
/// order.
pub fn assemble_updates(
    aggregator_id: &str,
    responses: &[SignedResponse],
) -> Result<Vec<UpdateRecord>, SwitchboardError> {
    let mut ordered: Vec<&SignedResponse> = responses.iter().collect();
    ordered.sort_by_key(|r| r.timestamp.unwrap_or(0));

    let mut records = Vec::with_capacity(ordered.len());
    for response in ordered {
        let hex = encode_feed_update(aggregator_id, response)?;
        let wire = ByteArray::from_hex(&hex)?;
        records.push(UpdateRecord { hex, wire });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_signature() -> String {
        BASE64.encode([0x11u8; 65])
    }

    fn response(value: &str, timestamp: Option<u64>) -> SignedResponse {
        SignedResponse {
            value: value.to_string(),
            timestamp,
            signature: valid_signature(),
            recovery_id: 0,
        }
    }

    const AGGREGATOR_ID: &str =
        "0xaabbccddeeff00112233445566778899aabbccddeeff001122334455667788";

    #[test]
    fn test_feed_update_layout() {
        let mut sig = vec![0u8; 65];
        sig[..32].copy_from_slice(&[0xaa; 32]);
        sig[32..64].copy_from_slice(&[0xbb; 32]);
        let resp = SignedResponse {
            value: "-2".to_string(),
            timestamp: Some(1_700_000_000),
            signature: BASE64.encode(&sig),
            recovery_id: 1,
        };
        let hex = encode_feed_update(AGGREGATOR_ID, &resp).unwrap();
        let bytes = hex::decode(&hex[2..]).unwrap();
        assert_eq!(bytes.len(), 154);
        assert_eq!(&bytes[..31], hex::decode(&AGGREGATOR_ID[2..]).unwrap().as_slice());
        assert_eq!(bytes[31], 0, "feed id ends with an appended zero byte");
        assert_eq!(bytes[32], FEED_UPDATE_DISCRIMINATOR);
        assert_eq!(&bytes[33..49], &(-2i128).to_be_bytes());
        assert_eq!(&bytes[49..57], &1_700_000_000u64.to_be_bytes());
        assert_eq!(&bytes[57..89], &[0xaa; 32]);
        assert_eq!(&bytes[89..121], &[0xbb; 32]);
        assert_eq!(bytes[121], 1);
        assert_eq!(&bytes[122..154], &[0u8; 32]);
    }

    #[test]
    fn test_missing_timestamp_serializes_as_zero() {
        let hex = encode_feed_update(AGGREGATOR_ID, &response("5", None)).unwrap();
        let bytes = hex::decode(&hex[2..]).unwrap();
        assert_eq!(&bytes[49..57], &[0u8; 8]);
    }

    #[test]
    fn test_assemble_sorts_by_timestamp() {
        let responses = vec![
            response("1", Some(50)),
            response("2", Some(10)),
            response("3", None),
            response("4", Some(30)),
        ];
        let records = assemble_updates(AGGREGATOR_ID, &responses).unwrap();
        let values: Vec<i128> = records
            .iter()
            .map(|r| {
                let bytes = hex::decode(&r.hex[2..]).unwrap();
                i128::from_be_bytes(bytes[33..49].try_into().unwrap())
            })
            .collect();
        // missing timestamp sorts as zero, ahead of everything
        assert_eq!(values, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_assemble_ties_keep_input_order() {
        let responses = vec![
            response("1", Some(20)),
            response("2", Some(20)),
            response("3", Some(20)),
        ];
        let records = assemble_updates(AGGREGATOR_ID, &responses).unwrap();
        let values: Vec<i128> = records
            .iter()
            .map(|r| {
                let bytes = hex::decode(&r.hex[2..]).unwrap();
                i128::from_be_bytes(bytes[33..49].try_into().unwrap())
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_assemble_is_all_or_nothing() {
        let responses = vec![response("1", Some(1)), response("not a number", Some(2))];
        assert!(matches!(
            assemble_updates(AGGREGATOR_ID, &responses),
            Err(SwitchboardError::PrecisionLoss(_))
        ));
    }

    #[test]
    fn test_short_signature_rejected() {
        let resp = SignedResponse {
            value: "1".to_string(),
            timestamp: Some(1),
            signature: BASE64.encode([0u8; 63]),
            recovery_id: 0,
        };
        assert!(matches!(
            encode_feed_update(AGGREGATOR_ID, &resp),
            Err(SwitchboardError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_invalid_base64_signature_rejected() {
        let resp = SignedResponse {
            value: "1".to_string(),
            timestamp: Some(1),
            signature: "!!not base64!!".to_string(),
            recovery_id: 0,
        };
        assert!(matches!(
            encode_feed_update(AGGREGATOR_ID, &resp),
            Err(SwitchboardError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_wrong_length_aggregator_id_rejected() {
        assert!(matches!(
            encode_feed_update("0xabcd", &response("1", Some(1))),
            Err(SwitchboardError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_randomness_reveal_layout() {
        let mut sig = vec![0u8; 65];
        sig[..32].copy_from_slice(&[0xcc; 32]);
        sig[32..64].copy_from_slice(&[0xdd; 32]);
        let id = Uint256 { low: 7, high: 0 };
        let hex =
            encode_randomness_reveal(&id, &[0xee, 0xff], &BASE64.encode(&sig), 1).unwrap();
        let bytes = hex::decode(&hex[2..]).unwrap();
        assert_eq!(bytes.len(), 130);
        assert_eq!(&bytes[..32], &id.to_bytes_be());
        assert_eq!(bytes[32], RANDOMNESS_REVEAL_DISCRIMINATOR);
        // value is left-padded to 32 bytes
        assert_eq!(&bytes[33..63], &[0u8; 30]);
        assert_eq!(&bytes[63..65], &[0xee, 0xff]);
        assert_eq!(&bytes[65..97], &[0xcc; 32]);
        assert_eq!(&bytes[97..129], &[0xdd; 32]);
        assert_eq!(bytes[129], 1);
    }

    #[test]
    fn test_randomness_reveal_rejects_oversized_value() {
        let id = Uint256::ZERO;
        assert!(
            encode_randomness_reveal(&id, &[0u8; 33], &valid_signature(), 0).is_err()
        );
    }
}
