// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The token a `RouteRequest` carries for each hop of a route: who this
//! session is, the private key it should authenticate with, its committed
//! bandwidth, and the address of the next hop to forward to.

use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    core::header::SessionFlags,
    crypto::sealed_box::{self, SealedBoxError, NONCE_SIZE},
    net::address::{Address, AddressError, ADDRESS_BYTES},
};

/// `expire_timestamp(8) + session_id(8) + session_version(1) +
/// session_flags(1) + kbps_up(4) + kbps_down(4) + next_addr(19) +
/// private_key(32)`.
pub const ROUTE_TOKEN_SIZE: usize = 8 + 8 + 1 + 1 + 4 + 4 + ADDRESS_BYTES + 32;
pub const ROUTE_TOKEN_ENCRYPTED_SIZE: usize = NONCE_SIZE + ROUTE_TOKEN_SIZE + sealed_box::MAC_SIZE;

#[derive(Debug, Error)]
pub enum RouteTokenError {
    #[error("route token buffer too short: need {ROUTE_TOKEN_SIZE} bytes, got {0}")]
    TooShort(usize),
    #[error("route token address field is invalid: {0}")]
    Address(#[from] AddressError),
    #[error(transparent)]
    Sealed(#[from] SealedBoxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteToken {
    pub expire_timestamp: u64,
    pub session_id: u64,
    pub session_version: u8,
    pub session_flags: SessionFlags,
    pub kbps_up: u32,
    pub kbps_down: u32,
    pub next_addr: Address,
    pub private_key: [u8; 32],
}

impl RouteToken {
    /// A session's per-session header key is derived from the two halves
    /// of its identity alone, so a relay forwarding many sessions never
    /// needs to look anything up beyond the token it was just handed.
    pub fn session_key(&self) -> u64 {
        self.session_id ^ u64::from(self.session_version)
    }

    fn write_plain(&self, out: &mut [u8; ROUTE_TOKEN_SIZE]) {
        out[0..8].copy_from_slice(&self.expire_timestamp.to_le_bytes());
        out[8..16].copy_from_slice(&self.session_id.to_le_bytes());
        out[16] = self.session_version;
        out[17] = self.session_flags.bits();
        out[18..22].copy_from_slice(&self.kbps_up.to_le_bytes());
        out[22..26].copy_from_slice(&self.kbps_down.to_le_bytes());
        let mut addr_bytes = [0u8; ADDRESS_BYTES];
        self.next_addr.write(&mut addr_bytes);
        out[26..26 + ADDRESS_BYTES].copy_from_slice(&addr_bytes);
        out[26 + ADDRESS_BYTES..].copy_from_slice(&self.private_key);
    }

    fn read_plain(data: &[u8; ROUTE_TOKEN_SIZE]) -> Result<Self, RouteTokenError> {
        let expire_timestamp = u64::from_le_bytes(data[0..8].try_into().expect("8 bytes"));
        let session_id = u64::from_le_bytes(data[8..16].try_into().expect("8 bytes"));
        let session_version = data[16];
        let session_flags = SessionFlags::from_bits_truncate(data[17]);
        let kbps_up = u32::from_le_bytes(data[18..22].try_into().expect("4 bytes"));
        let kbps_down = u32::from_le_bytes(data[22..26].try_into().expect("4 bytes"));
        let next_addr = Address::read(&data[26..26 + ADDRESS_BYTES])?;
        let mut private_key = [0u8; 32];
        private_key.copy_from_slice(&data[26 + ADDRESS_BYTES..]);
        Ok(RouteToken {
            expire_timestamp,
            session_id,
            session_version,
            session_flags,
            kbps_up,
            kbps_down,
            next_addr,
            private_key,
        })
    }

    /// Seals this token for one hop: `sender_secret` is the backend's key,
    /// `receiver_public` the addressed relay's. `nonce` must never repeat
    /// for a given key pair.
    pub fn encrypt(
        &self,
        sender_secret: &StaticSecret,
        receiver_public: &PublicKey,
        nonce: [u8; NONCE_SIZE],
    ) -> [u8; ROUTE_TOKEN_ENCRYPTED_SIZE] {
        let mut plain = [0u8; ROUTE_TOKEN_SIZE];
        self.write_plain(&mut plain);
        let sealed = sealed_box::seal(&plain, sender_secret, receiver_public, nonce);
        let mut out = [0u8; ROUTE_TOKEN_ENCRYPTED_SIZE];
        out.copy_from_slice(&sealed);
        out
    }

    pub fn decrypt(
        data: &[u8],
        sender_public: &PublicKey,
        receiver_secret: &StaticSecret,
    ) -> Result<Self, RouteTokenError> {
        if data.len() < ROUTE_TOKEN_ENCRYPTED_SIZE {
            return Err(RouteTokenError::TooShort(data.len()));
        }
        let plain = sealed_box::open_sealed(
            &data[..ROUTE_TOKEN_ENCRYPTED_SIZE],
            receiver_secret,
            sender_public,
        )?;
        let plain: [u8; ROUTE_TOKEN_SIZE] =
            plain.as_slice().try_into().map_err(|_| RouteTokenError::TooShort(plain.len()))?;
        Self::read_plain(&plain)
    }
}
