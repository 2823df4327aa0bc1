use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use argon2::Argon2;
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// The size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Derives an AES-256 key from an application secret using Argon2.
///
/// The salt is fixed per purpose so the same secret always yields the same
/// key across restarts; cookies sealed before a restart stay readable.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> Result<SecureKey> {
    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| AppError::Internal(format!("Argon2 key derivation error: {}", e)))?;
    Ok(SecureKey::new(key))
}

/// Generates a new random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext` and returns `ciphertext || nonce`.
///
/// `aad` is authenticated but not encrypted; opening with different
/// associated data fails.
pub fn seal(key: &SecureKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce_bytes = generate_nonce();

    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad })
        .map_err(|e| AppError::Internal(format!("Encryption failed: {}", e)))?;

    sealed.extend_from_slice(&nonce_bytes);
    Ok(sealed)
}

/// Reverses [`seal`]. Returns `None` when the input is truncated, was sealed
/// under another key or associated data, or has been tampered with.
pub fn open(key: &SecureKey, sealed: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return None;
    }

    let (ciphertext, nonce) = sealed.split_at(sealed.len() - NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .ok()
}
