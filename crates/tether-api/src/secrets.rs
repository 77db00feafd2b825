//! Per-owner sealing of secret fields at rest.
//!
//! The key is SHA-256 of the owner's secret; a sealed value is
//! `base64(nonce || ciphertext)` with a fresh 12-byte nonce per seal.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("sealed value is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("sealed value is too short")]
    Truncated,
    #[error("sealed value could not be authenticated")]
    Aead,
    #[error("unveiled value is not valid UTF-8")]
    Utf8,
}

impl From<chacha20poly1305::aead::Error> for SecretError {
    fn from(_: chacha20poly1305::aead::Error) -> Self {
        Self::Aead
    }
}

fn cipher(secret: &str) -> ChaCha20Poly1305 {
    let digest = Sha256::digest(secret.as_bytes());
    ChaCha20Poly1305::new(Key::from_slice(&digest))
}

pub fn seal(plaintext: &str, secret: &str) -> Result<String, SecretError> {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher(secret).encrypt(&nonce, plaintext.as_bytes())?;

    let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(payload))
}

pub fn unveil(sealed: &str, secret: &str) -> Result<String, SecretError> {
    let payload = BASE64.decode(sealed.trim())?;
    if payload.len() <= NONCE_SIZE {
        return Err(SecretError::Truncated);
    }
    let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);
    let plaintext = cipher(secret).decrypt(Nonce::from_slice(nonce), ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| SecretError::Utf8)
}

/// Fresh random secret for a newly provisioned user.
pub fn generate_user_secret() -> String {
    BASE64.encode(ChaCha20Poly1305::generate_key(&mut OsRng))
}
