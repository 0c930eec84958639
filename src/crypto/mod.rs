// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cryptographic primitives: the FNV-1a hash backing the packet filter, the
//! header AEAD, and a sealed-box scheme used to encrypt route/continue
//! tokens between the backend and relays.
//!
//! The header AEAD is ChaCha20-Poly1305 (IETF, 96-bit nonce) via
//! [`chacha20poly1305`]. Token sealing stands in for the original's
//! crypto_box (X25519 + XSalsa20-Poly1305): no crate in reach implements
//! that exact construction, so this uses X25519 key agreement
//! ([`x25519_dalek`]) with HKDF-SHA256 key derivation ([`hkdf`], [`sha2`])
//! feeding XChaCha20-Poly1305 ([`chacha20poly1305::XChaCha20Poly1305`]) —
//! the same primitive family, assembled from crates the retrieval pack
//! actually uses elsewhere.

pub mod fnv;
pub mod header_aead;
pub mod sealed_box;

pub use fnv::fnv1a_64;
pub use header_aead::{open_header, seal_header, HeaderAeadError};
pub use sealed_box::{open_sealed, seal, SealedBoxError};
