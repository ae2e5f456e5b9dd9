//! End-to-end properties of the update pipeline: gateway response shapes
//! through the assembler, the wire codec and calldata encoding.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use starknet::core::types::Felt;
use switchboard_starknet::contract::push_byte_array;
use switchboard_starknet::gateway::FeedEvalResponse;
use switchboard_starknet::update::{
    FEED_UPDATE_DISCRIMINATOR, RANDOMNESS_REVEAL_DISCRIMINATOR, assemble_updates,
    encode_randomness_reveal,
};
use switchboard_starknet::wire::{ByteArray, Numeric, Uint256, numeric_to_hex};

fn feed_id() -> String {
    // 31-byte aggregator id
    format!("0x{}", "ab".repeat(31))
}

fn gateway_response(value: &str, timestamp: Option<u64>) -> FeedEvalResponse {
    serde_json::from_value(serde_json::json!({
        "oracle_pubkey": "pubkey",
        "feed_hash": "deadbeef",
        "success_value": value,
        "failure_error": "",
        "signature": BASE64.encode([0x42u8; 65]),
        "recovery_id": 1,
        "timestamp": timestamp,
    }))
    .unwrap()
}

#[test]
fn gateway_responses_assemble_into_ordered_records() {
    let responses: Vec<_> = [
        gateway_response("100", Some(30)),
        gateway_response("101", Some(10)),
        gateway_response("102", None),
    ]
    .iter()
    .map(FeedEvalResponse::to_signed_response)
    .collect();

    let records = assemble_updates(&feed_id(), &responses).unwrap();
    assert_eq!(records.len(), 3);

    let timestamps: Vec<u64> = records
        .iter()
        .map(|r| {
            let bytes = hex::decode(&r.hex[2..]).unwrap();
            u64::from_be_bytes(bytes[49..57].try_into().unwrap())
        })
        .collect();
    assert_eq!(timestamps, vec![0, 10, 30]);

    for record in &records {
        let bytes = hex::decode(&record.hex[2..]).unwrap();
        assert_eq!(bytes.len(), 154);
        assert_eq!(bytes[32], FEED_UPDATE_DISCRIMINATOR);
        // the wire form decodes back to the same bytes
        assert_eq!(record.wire.to_bytes(), bytes);
        assert_eq!(record.wire.to_hex(), record.hex);
    }
}

#[test]
fn update_record_calldata_shape() {
    let responses = vec![gateway_response("7", Some(1)).to_signed_response()];
    let records = assemble_updates(&feed_id(), &responses).unwrap();

    let mut calldata = Vec::new();
    push_byte_array(&mut calldata, &records[0].wire);

    // 154 bytes = 4 full words + a 30-byte pending word
    assert_eq!(calldata[0], Felt::from(4u64));
    assert_eq!(calldata.len(), 1 + 4 + 2);
    assert_eq!(calldata[calldata.len() - 1], Felt::from(30u64));
}

#[test]
fn randomness_reveal_record_is_stable() {
    let id = Uint256::from_hex(
        "0x00000000000000000000000000000000000000000000000000000000000000ff",
    )
    .unwrap();
    let mut sig = vec![0u8; 65];
    sig[..32].copy_from_slice(&[0x01; 32]);
    sig[32..64].copy_from_slice(&[0x02; 32]);

    let hex = encode_randomness_reveal(&id, &[0xaa; 32], &BASE64.encode(&sig), 0).unwrap();
    let bytes = hex::decode(&hex[2..]).unwrap();
    assert_eq!(bytes.len(), 130);
    assert_eq!(bytes[31], 0xff);
    assert_eq!(bytes[32], RANDOMNESS_REVEAL_DISCRIMINATOR);
    assert_eq!(&bytes[33..65], &[0xaa; 32]);

    // and it wire-encodes losslessly
    let wire = ByteArray::from_hex(&hex).unwrap();
    assert_eq!(wire.to_hex(), hex);
}

#[test]
fn malformed_response_aborts_the_whole_batch() {
    let responses: Vec<_> = [
        gateway_response("100", Some(1)),
        gateway_response("1e18", Some(2)), // scientific notation is not an i128
    ]
    .iter()
    .map(FeedEvalResponse::to_signed_response)
    .collect();
    assert!(assemble_updates(&feed_id(), &responses).is_err());
}

#[test]
fn numeric_hex_round_trips_through_uint256() {
    for value in [
        Uint256 { low: 0, high: 0 },
        Uint256 { low: 1, high: 0 },
        Uint256 { low: u128::MAX, high: 0 },
        Uint256 { low: 0, high: 1 },
        Uint256 {
            low: u128::MAX,
            high: u128::MAX,
        },
    ] {
        let hex = numeric_to_hex(Numeric::Uint256(value)).unwrap();
        assert_eq!(Uint256::from_hex(&hex).unwrap(), value);
    }
}

#[test]
fn byte_array_round_trips_arbitrary_lengths() {
    for len in [0usize, 1, 30, 31, 32, 61, 62, 63, 154] {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let hex = format!("0x{}", hex::encode(&payload));
        let wire = ByteArray::from_hex(&hex).unwrap();
        assert_eq!(wire.byte_len(), len);
        assert_eq!(wire.to_bytes(), payload);
        assert_eq!(wire.to_hex(), hex);
        assert!(wire.pending_word_len < 31);
    }
}
