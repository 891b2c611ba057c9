//! Record encryption codec
//!
//! Envelope format (single line, ASCII):
//!
//! ```text
//! ENCRYPTED_v1:<b64 iv>:<b64 salt>:<b64 ciphertext>:<b64 auth tag>
//! ```
//!
//! - AES-256-GCM with a fresh 12-byte IV per call
//! - Key derived with PBKDF2-HMAC-SHA256 from the passphrase and a fresh 16-byte salt
//! - The prefix lets readers tell ciphertext from plaintext JSON without decrypting

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use sha2::Sha256;

use crate::error::CryptoError;

/// Literal tag that starts every envelope
pub const ENVELOPE_PREFIX: &str = "ENCRYPTED_v1:";

const IV_LEN: usize = 12;
const SALT_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Check whether a stored document is an encrypted envelope
pub fn is_encrypted(contents: &str) -> bool {
    contents.trim_start().starts_with(ENVELOPE_PREFIX)
}

/// Encrypt `plaintext` under `passphrase`, producing a self-contained envelope
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> Result<String, CryptoError> {
    if passphrase.is_empty() {
        return Err(CryptoError::CryptoFailure("empty passphrase".to_string()));
    }

    let mut iv = [0u8; IV_LEN];
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let cipher = cipher_for(passphrase, &salt)?;
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::CryptoFailure("AES-GCM encryption failed".to_string()))?;

    // aes-gcm appends the tag to the ciphertext; the envelope carries it separately
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}{}:{}:{}:{}",
        ENVELOPE_PREFIX,
        STANDARD.encode(iv),
        STANDARD.encode(salt),
        STANDARD.encode(&sealed),
        STANDARD.encode(&tag)
    ))
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Never returns plaintext unless the authentication tag verifies.
pub fn decrypt(envelope: &str, passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let body = envelope
        .trim()
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or_else(|| CryptoError::InvalidFormat("missing ENCRYPTED_v1 prefix".to_string()))?;

    let fields: Vec<&str> = body.split(':').collect();
    if fields.len() != 4 {
        return Err(CryptoError::InvalidFormat(format!(
            "expected 4 fields after prefix, found {}",
            fields.len()
        )));
    }

    let iv = decode_field("iv", fields[0])?;
    let salt = decode_field("salt", fields[1])?;
    let mut sealed = decode_field("ciphertext", fields[2])?;
    let tag = decode_field("auth tag", fields[3])?;

    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "iv must be {} bytes, found {}",
            IV_LEN,
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "auth tag must be {} bytes, found {}",
            TAG_LEN,
            tag.len()
        )));
    }
    if passphrase.is_empty() {
        return Err(CryptoError::CryptoFailure("empty passphrase".to_string()));
    }

    let cipher = cipher_for(passphrase, &salt)?;
    sealed.extend_from_slice(&tag);
    cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
        .map_err(|_| {
            CryptoError::CryptoFailure(
                "authentication failed (wrong passphrase or tampered data)".to_string(),
            )
        })
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::InvalidFormat(format!("malformed base64 in {}: {}", name, e)))
}

fn cipher_for(passphrase: &str, salt: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::CryptoFailure(format!("cipher init: {}", e)))
}
