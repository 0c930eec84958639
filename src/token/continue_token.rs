// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The token carried by `ContinueRequest`/`ContinueResponse` to extend an
//! already-established session's expiry without re-deriving its route.
//! Plain session identity only — no routing or key material, since the
//! session this refers to already holds both.

use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    core::header::SessionFlags,
    crypto::sealed_box::{self, SealedBoxError, NONCE_SIZE},
};

/// `expire_timestamp(8) + session_id(8) + session_version(1) +
/// session_flags(1)`.
pub const CONTINUE_TOKEN_SIZE: usize = 8 + 8 + 1 + 1;
pub const CONTINUE_TOKEN_ENCRYPTED_SIZE: usize =
    NONCE_SIZE + CONTINUE_TOKEN_SIZE + sealed_box::MAC_SIZE;

#[derive(Debug, Error)]
pub enum ContinueTokenError {
    #[error("continue token buffer too short: need {CONTINUE_TOKEN_SIZE} bytes, got {0}")]
    TooShort(usize),
    #[error(transparent)]
    Sealed(#[from] SealedBoxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinueToken {
    pub expire_timestamp: u64,
    pub session_id: u64,
    pub session_version: u8,
    pub session_flags: SessionFlags,
}

impl ContinueToken {
    fn write_plain(&self, out: &mut [u8; CONTINUE_TOKEN_SIZE]) {
        out[0..8].copy_from_slice(&self.expire_timestamp.to_le_bytes());
        out[8..16].copy_from_slice(&self.session_id.to_le_bytes());
        out[16] = self.session_version;
        out[17] = self.session_flags.bits();
    }

    fn read_plain(data: &[u8; CONTINUE_TOKEN_SIZE]) -> Self {
        ContinueToken {
            expire_timestamp: u64::from_le_bytes(data[0..8].try_into().expect("8 bytes")),
            session_id: u64::from_le_bytes(data[8..16].try_into().expect("8 bytes")),
            session_version: data[16],
            session_flags: SessionFlags::from_bits_truncate(data[17]),
        }
    }

    pub fn encrypt(
        &self,
        sender_secret: &StaticSecret,
        receiver_public: &PublicKey,
        nonce: [u8; NONCE_SIZE],
    ) -> [u8; CONTINUE_TOKEN_ENCRYPTED_SIZE] {
        let mut plain = [0u8; CONTINUE_TOKEN_SIZE];
        self.write_plain(&mut plain);
        let sealed = sealed_box::seal(&plain, sender_secret, receiver_public, nonce);
        let mut out = [0u8; CONTINUE_TOKEN_ENCRYPTED_SIZE];
        out.copy_from_slice(&sealed);
        out
    }

    pub fn decrypt(
        data: &[u8],
        sender_public: &PublicKey,
        receiver_secret: &StaticSecret,
    ) -> Result<Self, ContinueTokenError> {
        if data.len() < CONTINUE_TOKEN_ENCRYPTED_SIZE {
            return Err(ContinueTokenError::TooShort(data.len()));
        }
        let plain = sealed_box::open_sealed(
            &data[..CONTINUE_TOKEN_ENCRYPTED_SIZE],
            receiver_secret,
            sender_public,
        )?;
        let plain: [u8; CONTINUE_TOKEN_SIZE] =
            plain.as_slice().try_into().map_err(|_| ContinueTokenError::TooShort(plain.len()))?;
        Ok(Self::read_plain(&plain))
    }
}
