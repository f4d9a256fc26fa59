//! Backup blob cipher.
//!
//! Blob layout: 24-byte random nonce ‖ XChaCha20-Poly1305 ciphertext (the
//! 16-byte tag is appended by the AEAD). The plaintext is wrapped in a gzip
//! container written at `Compression::none()` before encryption — the
//! framing is kept for wire compatibility, but actually compressing would
//! leak plaintext structure through the blob length, so stored size always
//! grows, never shrinks.

use std::io::{Read, Write};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::RngCore;
use sha2::{Digest, Sha256};

use msgsafe_core::{SafeError, SafeResult};

use crate::kdf::MasterKey;

/// XChaCha20 nonce length, prefixed to every blob.
pub const NONCE_SIZE: usize = 24;
/// Poly1305 tag length, appended by the AEAD.
pub const TAG_SIZE: usize = 16;

/// Encrypt a backup payload under the key's encryption half.
pub fn encrypt(key: &MasterKey, plaintext: &[u8]) -> SafeResult<Vec<u8>> {
    if plaintext.is_empty() {
        return Err(SafeError::InvalidData("empty backup payload".into()));
    }

    let framed = frame(plaintext)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.encryption_key()));
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), framed.as_slice())
        .map_err(|_| SafeError::InvalidData("encryption failed".into()))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a backup blob back to its payload.
///
/// A blob too short to contain a nonce and tag fails before any key
/// material is touched, so callers can tell truncation from a wrong key
/// only by the error detail, never by timing.
pub fn decrypt(key: &MasterKey, blob: &[u8]) -> SafeResult<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(SafeError::InvalidData(format!(
            "blob too short: {} bytes",
            blob.len()
        )));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.encryption_key()));
    let framed = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| SafeError::InvalidData("authentication failed".into()))?;

    unframe(&framed)
}

/// Hex SHA-256 over a payload, used to detect unchanged backup content.
pub fn checksum(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

fn frame(plaintext: &[u8]) -> SafeResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::none());
    encoder.write_all(plaintext)?;
    Ok(encoder.finish()?)
}

fn unframe(framed: &[u8]) -> SafeResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(framed);
    let mut plaintext = Vec::new();
    decoder
        .read_to_end(&mut plaintext)
        .map_err(|e| SafeError::InvalidData(format!("bad blob framing: {e}")))?;
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_master_key;
    use proptest::prelude::*;

    fn test_key() -> MasterKey {
        derive_master_key("ECHOECHO", &"shootdeathstar".into()).unwrap()
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let payload = br#"{"info":{"version":1,"device":"test"}}"#;
        let blob = encrypt(&key, payload).unwrap();
        assert_eq!(decrypt(&key, &blob).unwrap(), payload);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            encrypt(&test_key(), b""),
            Err(SafeError::InvalidData(_))
        ));
    }

    #[test]
    fn nonces_are_fresh_per_blob() {
        let key = test_key();
        let a = encrypt(&key, b"same payload").unwrap();
        let b = encrypt(&key, b"same payload").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn tampering_is_detected() {
        let key = test_key();
        let mut blob = encrypt(&key, b"payload").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        match decrypt(&key, &blob) {
            Err(SafeError::InvalidData(detail)) => assert!(detail.contains("authentication")),
            other => panic!("expected InvalidData, got {other:?}"),
        }
    }

    #[test]
    fn truncated_blob_is_detected_early() {
        match decrypt(&test_key(), &[0u8; NONCE_SIZE + TAG_SIZE - 1]) {
            Err(SafeError::InvalidData(detail)) => assert!(detail.contains("too short")),
            other => panic!("expected InvalidData, got {other:?}"),
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = encrypt(&test_key(), b"payload").unwrap();
        let other = derive_master_key("ECHOECHO", &"wrong password".into()).unwrap();
        assert!(decrypt(&other, &blob).is_err());
    }

    #[test]
    fn framing_never_compresses() {
        // Highly repetitive payloads must not shrink on the wire.
        let key = test_key();
        let payload = vec![b'a'; 4096];
        let blob = encrypt(&key, &payload).unwrap();
        assert!(blob.len() > payload.len());
    }

    #[test]
    fn checksum_is_stable_hex_sha256() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(checksum(b"abc"), checksum(b"abc"));
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 1..2048)) {
            let key = test_key();
            let blob = encrypt(&key, &payload).unwrap();
            prop_assert_eq!(decrypt(&key, &blob).unwrap(), payload);
        }
    }
}
