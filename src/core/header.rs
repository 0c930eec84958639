// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The authenticated header every relay packet carries directly after its
//! [`crate::core::filter`] preamble: `type | sequence | session_id |
//! session_version | session_flags`, followed by a 16-byte AEAD tag over
//! those fields. The relay never decrypts the payload that follows — only
//! this header is authenticated — so tampering with sequence numbers or
//! session identity is the one thing a relay can and must catch on its own.

use crate::{
    consts::HEADER_SIZE,
    crypto::header_aead::{self, HeaderAeadError, HEADER_TAG_SIZE},
};

/// Size of the header fields alone, excluding the trailing AEAD tag.
pub const HEADER_FIELDS_SIZE: usize = HEADER_SIZE - HEADER_TAG_SIZE;

/// Set on the sequence number of a packet travelling server-to-client.
pub const SEQUENCE_DIRECTION_BIT: u64 = 1 << 63;
/// Set on the sequence number of a response, session-ping, or session-pong
/// packet (as opposed to a plain forwarded payload).
pub const SEQUENCE_ROLE_BIT: u64 = 1 << 62;

/// Strips the two high role/direction bits, leaving the sequence value
/// used for ordering and replay comparisons.
pub fn clean_sequence(sequence: u64) -> u64 {
    sequence & !(SEQUENCE_DIRECTION_BIT | SEQUENCE_ROLE_BIT)
}

bitflags::bitflags! {
    /// Per-packet session flags. Only one bit is defined today; the rest
    /// are reserved so the wire format never needs to change size.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionFlags: u8 {
        /// Set on tokens minted for relays that predate sealed-box token
        /// encryption. Reserved, never produced or honored by this relay.
        const LEGACY_TOKEN = 0x01;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub packet_type: u8,
    pub sequence: u64,
    pub session_id: u64,
    pub session_version: u8,
    pub session_flags: SessionFlags,
}

impl Header {
    fn write_fields(&self, out: &mut [u8; HEADER_FIELDS_SIZE]) {
        out[0] = self.packet_type;
        out[1..9].copy_from_slice(&self.sequence.to_le_bytes());
        out[9..17].copy_from_slice(&self.session_id.to_le_bytes());
        out[17] = self.session_version;
        out[18] = self.session_flags.bits();
    }

    fn read_fields(data: &[u8; HEADER_FIELDS_SIZE]) -> Self {
        Header {
            packet_type: data[0],
            sequence: u64::from_le_bytes(data[1..9].try_into().expect("9-1=8 bytes")),
            session_id: u64::from_le_bytes(data[9..17].try_into().expect("17-9=8 bytes")),
            session_version: data[17],
            session_flags: SessionFlags::from_bits_truncate(data[18]),
        }
    }

    /// Writes the fields and appends a valid authentication tag, producing
    /// a full [`HEADER_SIZE`]-byte header.
    pub fn write(&self, key: &[u8; 32], out: &mut [u8; HEADER_SIZE]) {
        let mut fields = [0u8; HEADER_FIELDS_SIZE];
        self.write_fields(&mut fields);
        out[..HEADER_FIELDS_SIZE].copy_from_slice(&fields);
        let tag = header_aead::seal_header(key, self.sequence, &fields);
        out[HEADER_FIELDS_SIZE..].copy_from_slice(&tag);
    }

    /// Parses and authenticates a header. Fails if the tag does not match
    /// the fields under `key` — the only way a relay detects a forged or
    /// corrupted header, since it does not decrypt the payload.
    pub fn read(key: &[u8; 32], data: &[u8]) -> Result<Self, HeaderAeadError> {
        let header = Self::peek(data).ok_or(HeaderAeadError::Forged)?;
        header.verify(key, data)?;
        Ok(header)
    }

    /// Parses the header fields without checking the tag. Used by
    /// handlers that must read `session_id`/`session_version` to look up
    /// the session's key *before* they can authenticate the rest of the
    /// header — session lookup has to come first, since verification
    /// needs the session's private key.
    pub fn peek(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        let fields: [u8; HEADER_FIELDS_SIZE] = data[..HEADER_FIELDS_SIZE].try_into().ok()?;
        Some(Self::read_fields(&fields))
    }

    /// Authenticates `data` (as produced by a prior [`Self::peek`] of the
    /// same bytes) under `key`.
    pub fn verify(&self, key: &[u8; 32], data: &[u8]) -> Result<(), HeaderAeadError> {
        if data.len() < HEADER_SIZE {
            return Err(HeaderAeadError::Forged);
        }
        let fields = &data[..HEADER_FIELDS_SIZE];
        let mut tag = [0u8; HEADER_TAG_SIZE];
        tag.copy_from_slice(&data[HEADER_FIELDS_SIZE..HEADER_SIZE]);
        header_aead::open_header(key, self.sequence, fields, &tag)
    }
}
