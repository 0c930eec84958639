// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fatal, control-plane error type. Per-packet and per-session rejections are
//! never represented here — they are logged and dropped at the call site, as
//! required by the relay's error-handling design: a malformed packet must
//! never unwind the dispatcher loop.

use thiserror::Error;

/// A fatal error that halts the relay and selects its process exit code.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("crypto initialization failed: {0}")]
    Crypto(String),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("backend handshake failed: {0}")]
    BackendHandshake(String),

    #[error("backend updates failed {0} consecutive times; giving up")]
    BackendRetriesExhausted(u32),
}

impl RelayError {
    /// Process exit code this error maps to (§6 Exit codes).
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::BackendRetriesExhausted(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
