//! End-to-end envelope behavior in local and remote key custody

use std::sync::{Arc, OnceLock};

use base64::{engine::general_purpose::STANDARD, Engine};
use vault::crypto::{generate_key_pair, KeyPair, KeySize};
use vault::kms::{InMemoryCustodian, RemoteKeyWrapper, RetryPolicy};
use vault::{Envelope, EnvelopeCodec, KeyIdentity, UnwrapCredential, VaultError, WrapMode};

const KEY_PATH: &str = "compliance/documents";

fn pair_a() -> &'static KeyPair {
    static PAIR: OnceLock<KeyPair> = OnceLock::new();
    PAIR.get_or_init(|| generate_key_pair(KeySize::Rsa2048).unwrap())
}

fn pair_b() -> &'static KeyPair {
    static PAIR: OnceLock<KeyPair> = OnceLock::new();
    PAIR.get_or_init(|| generate_key_pair(KeySize::Rsa2048).unwrap())
}

fn remote_codec() -> (EnvelopeCodec, Arc<InMemoryCustodian>) {
    let custodian = Arc::new(InMemoryCustodian::default());
    custodian.create_key(KEY_PATH).unwrap();
    let wrapper = RemoteKeyWrapper::new(custodian.clone(), KEY_PATH)
        .with_retry_policy(RetryPolicy::immediate(3));
    (EnvelopeCodec::with_remote(wrapper), custodian)
}

fn rebuild(envelope: &Envelope, ciphertext: &str, auth_tag: &str) -> Envelope {
    Envelope::from_parts(
        ciphertext,
        envelope.wrapped_key(),
        envelope.iv(),
        auth_tag,
        envelope.key_identity().clone(),
    )
}

fn flip_byte(field: &str, index: usize) -> String {
    let mut bytes = STANDARD.decode(field).unwrap();
    bytes[index] ^= 0x01;
    STANDARD.encode(bytes)
}

#[tokio::test]
async fn scenario_a_local_string_round_trip() {
    let pair = pair_a();
    let codec = EnvelopeCodec::new();

    let envelope = codec
        .seal_string("sensitive information", WrapMode::Local(&pair.public_key))
        .await
        .unwrap();
    let opened = codec
        .open_string(&envelope, UnwrapCredential::Local(&pair.private_key))
        .await
        .unwrap();

    assert_eq!(opened, "sensitive information");
}

#[tokio::test]
async fn scenario_b_remote_binary_round_trip_with_version() {
    let (codec, _custodian) = remote_codec();
    let png_header = [0x89u8, 0x50, 0x4E, 0x47];

    let envelope = codec
        .seal_bytes(&png_header, WrapMode::Remote { key_version: Some("1") })
        .await
        .unwrap();
    assert_eq!(
        envelope.key_identity(),
        &KeyIdentity::Remote {
            key_path: KEY_PATH.to_string(),
            key_version: "1".to_string(),
        }
    );

    let opened = codec
        .open_bytes(&envelope, UnwrapCredential::Remote)
        .await
        .unwrap();
    assert_eq!(opened, png_header);
}

#[tokio::test]
async fn scenario_d_altered_auth_tag_is_integrity_error() {
    let pair = pair_a();
    let codec = EnvelopeCodec::new();
    let envelope = codec
        .seal_string("sensitive information", WrapMode::Local(&pair.public_key))
        .await
        .unwrap();

    let tag = envelope.auth_tag();
    let altered = format!("{}AAAA", &tag[..tag.len() - 4]);
    assert_ne!(altered, tag);
    let tampered = rebuild(&envelope, envelope.ciphertext(), &altered);

    let err = codec
        .open_string(&tampered, UnwrapCredential::Local(&pair.private_key))
        .await
        .unwrap_err();
    assert!(err.is_integrity(), "expected integrity error, got {:?}", err);
}

#[tokio::test]
async fn empty_and_large_payloads_round_trip_in_both_modes() {
    let pair = pair_a();
    let (codec, _custodian) = remote_codec();
    let large: Vec<u8> = (0..150 * 1024).map(|i| (i % 251) as u8).collect();

    for payload in [Vec::new(), large] {
        let local = codec
            .seal_bytes(&payload, WrapMode::Local(&pair.public_key))
            .await
            .unwrap();
        let opened = codec
            .open_bytes(&local, UnwrapCredential::Local(&pair.private_key))
            .await
            .unwrap();
        assert_eq!(opened, payload);

        let remote = codec
            .seal_bytes(&payload, WrapMode::Remote { key_version: None })
            .await
            .unwrap();
        let opened = codec
            .open_bytes(&remote, UnwrapCredential::Remote)
            .await
            .unwrap();
        assert_eq!(opened, payload);
    }

    let empty = codec
        .seal_string("", WrapMode::Local(&pair.public_key))
        .await
        .unwrap();
    assert_eq!(
        codec
            .open_string(&empty, UnwrapCredential::Local(&pair.private_key))
            .await
            .unwrap(),
        ""
    );
}

#[tokio::test]
async fn envelope_survives_json_transport() {
    let pair = pair_a();
    let (codec, _custodian) = remote_codec();

    let local = codec
        .seal_string("ssn: 123-45-6789", WrapMode::Local(&pair.public_key))
        .await
        .unwrap();
    let parsed = Envelope::from_json(&local.to_json().unwrap()).unwrap();
    assert_eq!(
        codec
            .open_string(&parsed, UnwrapCredential::Local(&pair.private_key))
            .await
            .unwrap(),
        "ssn: 123-45-6789"
    );

    let remote = codec
        .seal_string("medical note", WrapMode::Remote { key_version: None })
        .await
        .unwrap();
    let parsed = Envelope::from_json(&remote.to_json().unwrap()).unwrap();
    assert_eq!(
        codec
            .open_string(&parsed, UnwrapCredential::Remote)
            .await
            .unwrap(),
        "medical note"
    );
}

#[tokio::test]
async fn every_seal_uses_fresh_randomness() {
    let pair = pair_a();
    let (codec, _custodian) = remote_codec();

    for mode in [WrapMode::Local(&pair.public_key), WrapMode::Remote { key_version: None }] {
        let first = codec.seal_string("same plaintext", mode).await.unwrap();
        let second = codec.seal_string("same plaintext", mode).await.unwrap();

        assert_ne!(first.ciphertext(), second.ciphertext());
        assert_ne!(first.iv(), second.iv());
        assert_ne!(first.wrapped_key(), second.wrapped_key());
    }
}

#[tokio::test]
async fn flipped_ciphertext_or_tag_byte_is_integrity_error() {
    let pair = pair_a();
    let codec = EnvelopeCodec::new();
    let envelope = codec
        .seal_string("payroll record", WrapMode::Local(&pair.public_key))
        .await
        .unwrap();
    let credential = UnwrapCredential::Local(&pair.private_key);

    let ciphertext_len = STANDARD.decode(envelope.ciphertext()).unwrap().len();
    for index in [0, ciphertext_len / 2, ciphertext_len - 1] {
        let tampered = rebuild(
            &envelope,
            &flip_byte(envelope.ciphertext(), index),
            envelope.auth_tag(),
        );
        let err = codec.open_string(&tampered, credential).await.unwrap_err();
        assert!(err.is_integrity());
    }

    for index in [0, 7, 15] {
        let tampered = rebuild(
            &envelope,
            envelope.ciphertext(),
            &flip_byte(envelope.auth_tag(), index),
        );
        let err = codec.open_string(&tampered, credential).await.unwrap_err();
        assert!(err.is_integrity());
    }
}

#[tokio::test]
async fn wrong_key_pair_is_key_mismatch() {
    let codec = EnvelopeCodec::new();
    let envelope = codec
        .seal_string("sensitive information", WrapMode::Local(&pair_a().public_key))
        .await
        .unwrap();

    let err = codec
        .open_string(&envelope, UnwrapCredential::Local(&pair_b().private_key))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KeyMismatch));
}

#[tokio::test]
async fn structurally_invalid_envelope_is_validation_error() {
    let pair = pair_a();
    let codec = EnvelopeCodec::new();
    let envelope = codec
        .seal_string("x", WrapMode::Local(&pair.public_key))
        .await
        .unwrap();
    let credential = UnwrapCredential::Local(&pair.private_key);

    let not_base64 = rebuild(&envelope, "%%%not-base64%%%", envelope.auth_tag());
    assert!(codec
        .open_string(&not_base64, credential)
        .await
        .unwrap_err()
        .is_validation());

    let missing_key = Envelope::from_parts(
        envelope.ciphertext(),
        "",
        envelope.iv(),
        envelope.auth_tag(),
        KeyIdentity::Local,
    );
    assert!(codec
        .open_string(&missing_key, credential)
        .await
        .unwrap_err()
        .is_validation());

    let mut value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("iv");
    assert!(Envelope::from_json(&value.to_string())
        .unwrap_err()
        .is_validation());
}

#[tokio::test]
async fn old_envelopes_open_after_rotation() {
    let (codec, custodian) = remote_codec();

    let before = codec
        .seal_string("v1 record", WrapMode::Remote { key_version: None })
        .await
        .unwrap();
    custodian.rotate(KEY_PATH).unwrap();
    let after = codec
        .seal_string("v2 record", WrapMode::Remote { key_version: None })
        .await
        .unwrap();

    assert!(matches!(
        after.key_identity(),
        KeyIdentity::Remote { key_version, .. } if key_version == "2"
    ));
    assert_eq!(
        codec
            .open_string(&before, UnwrapCredential::Remote)
            .await
            .unwrap(),
        "v1 record"
    );
    assert_eq!(
        codec
            .open_string(&after, UnwrapCredential::Remote)
            .await
            .unwrap(),
        "v2 record"
    );
}

#[tokio::test]
async fn remote_failures_map_to_stable_kinds() {
    let (codec, custodian) = remote_codec();
    let envelope = codec
        .seal_string("x", WrapMode::Remote { key_version: None })
        .await
        .unwrap();

    custodian.disable_version(KEY_PATH, "1");
    let err = codec
        .open_string(&envelope, UnwrapCredential::Remote)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KeyVersionNotFound { .. }));
    assert!(!err.is_retryable());

    custodian.deny(KEY_PATH);
    let err = codec
        .seal_string("x", WrapMode::Remote { key_version: None })
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied));

    let calls = custodian.call_count();
    custodian.set_healthy(false);
    let err = codec
        .seal_string("x", WrapMode::Remote { key_version: None })
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KeyManagementUnavailable));
    assert!(err.is_retryable());
    assert_eq!(custodian.call_count(), calls + 3);
}
