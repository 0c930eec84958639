// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authentication (not encryption) of the per-packet header.
//!
//! The relay forwards payloads opaquely — it never decrypts player
//! traffic — but it must be able to detect a forged or replayed header.
//! The header fields (`type | sequence | session_id | session_version |
//! session_flags`) are carried as AEAD associated data over an empty
//! plaintext, yielding just a 16-byte tag appended to the header. The
//! nonce is `0u32 || sequence:u64`, little-endian, 12 bytes: unique per
//! sequence number for the lifetime of a session key, never reused
//! because the replay window rejects non-increasing sequences first.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use thiserror::Error;

pub const HEADER_TAG_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum HeaderAeadError {
    #[error("header authentication tag rejected")]
    Forged,
}

fn build_nonce(sequence: u64) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..12].copy_from_slice(&sequence.to_le_bytes());
    *Nonce::from_slice(&bytes)
}

/// Computes the 16-byte tag authenticating `header_fields` under `key` for
/// `sequence`. `header_fields` is everything preceding the tag in the
/// packet header (type, sequence, session id, session version, flags).
pub fn seal_header(
    key: &[u8; 32],
    sequence: u64,
    header_fields: &[u8],
) -> [u8; HEADER_TAG_SIZE] {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = build_nonce(sequence);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: &[], aad: header_fields })
        .expect("encrypting an empty plaintext cannot fail");
    let mut tag = [0u8; HEADER_TAG_SIZE];
    tag.copy_from_slice(&ciphertext);
    tag
}

/// Verifies a header tag produced by [`seal_header`].
pub fn open_header(
    key: &[u8; 32],
    sequence: u64,
    header_fields: &[u8],
    tag: &[u8; HEADER_TAG_SIZE],
) -> Result<(), HeaderAeadError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = build_nonce(sequence);
    cipher
        .decrypt(&nonce, Payload { msg: tag, aad: header_fields })
        .map(|_| ())
        .map_err(|_| HeaderAeadError::Forged)
}
