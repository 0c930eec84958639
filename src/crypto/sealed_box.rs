// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sealed-box encryption for route/continue tokens: X25519 key agreement,
//! HKDF-SHA256 key derivation, XChaCha20-Poly1305 for the payload.
//!
//! Tokens are produced by the backend for a specific relay's public key and
//! opened by that relay alone, so this is a fixed sender/recipient keypair
//! scheme rather than ephemeral-key sealing: both sides already know each
//! other's static X25519 key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

pub const NONCE_SIZE: usize = 24;
pub const MAC_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum SealedBoxError {
    #[error("sealed box ciphertext too short")]
    TooShort,
    #[error("sealed box authentication failed")]
    Forged,
}

fn shared_cipher(our_secret: &StaticSecret, their_public: &PublicKey) -> XChaCha20Poly1305 {
    let shared = our_secret.diffie_hellman(their_public);
    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"relay-node token seal", &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    XChaCha20Poly1305::new((&key).into())
}

/// Encrypts `plaintext` from `our_secret` to `their_public`, prefixing a
/// random 24-byte nonce. Output is `nonce || ciphertext || 16-byte tag`.
pub fn seal(
    plaintext: &[u8],
    our_secret: &StaticSecret,
    their_public: &PublicKey,
    nonce: [u8; NONCE_SIZE],
) -> Vec<u8> {
    let cipher = shared_cipher(our_secret, their_public);
    let xnonce = XNonce::from_slice(&nonce);
    let mut out = Vec::with_capacity(NONCE_SIZE + plaintext.len() + MAC_SIZE);
    out.extend_from_slice(&nonce);
    let ciphertext = cipher
        .encrypt(xnonce, plaintext)
        .expect("XChaCha20-Poly1305 encryption of a bounded token cannot fail");
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypts a buffer produced by [`seal`].
pub fn open_sealed(
    sealed: &[u8],
    our_secret: &StaticSecret,
    their_public: &PublicKey,
) -> Result<Vec<u8>, SealedBoxError> {
    if sealed.len() < NONCE_SIZE + MAC_SIZE {
        return Err(SealedBoxError::TooShort);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = shared_cipher(our_secret, their_public);
    let xnonce = XNonce::from_slice(nonce_bytes);
    cipher
        .decrypt(xnonce, ciphertext)
        .map_err(|_| SealedBoxError::Forged)
}
