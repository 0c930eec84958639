// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single forwarding flow: the two directions of a route between a
//! client and a game server through this relay, keyed by `session_id`.
//!
//! Every mutable field lives behind the session's own [`Mutex`] rather
//! than the map's — a deliberate strengthening over the original, which
//! left these fields unsynchronized and relied on the dispatcher owning a
//! session exclusively per-packet. Multiple dispatcher threads can now
//! touch the same session concurrently (its two directions may arrive on
//! different threads), so the session itself must be safe to share.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use crate::{
    core::{bandwidth::BandwidthLimiter, replay::ReplayWindow},
    net::address::Address,
};

pub struct SessionState {
    pub client_to_server_seq: u64,
    pub server_to_client_seq: u64,
    pub kbps_up: u32,
    pub kbps_down: u32,
    pub client_to_server_replay: ReplayWindow,
    pub server_to_client_replay: ReplayWindow,
    pub client_to_server_bandwidth: BandwidthLimiter,
    pub server_to_client_bandwidth: BandwidthLimiter,
}

impl SessionState {
    fn new() -> Self {
        Self {
            client_to_server_seq: 0,
            server_to_client_seq: 0,
            kbps_up: 0,
            kbps_down: 0,
            client_to_server_replay: ReplayWindow::new(),
            server_to_client_replay: ReplayWindow::new(),
            client_to_server_bandwidth: BandwidthLimiter::new(),
            server_to_client_bandwidth: BandwidthLimiter::new(),
        }
    }
}

pub struct Session {
    pub session_id: u64,
    pub session_version: u8,
    expire_timestamp: AtomicU64,
    pub prev_addr: Address,
    pub next_addr: Address,
    pub private_key: [u8; 32],
    pub state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        session_id: u64,
        session_version: u8,
        expire_timestamp: u64,
        prev_addr: Address,
        next_addr: Address,
        private_key: [u8; 32],
    ) -> Self {
        Self {
            session_id,
            session_version,
            expire_timestamp: AtomicU64::new(expire_timestamp),
            prev_addr,
            next_addr,
            private_key,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn expire_timestamp(&self) -> u64 {
        self.expire_timestamp.load(Ordering::Relaxed)
    }

    /// `true` once the backend's clock has reached or passed this
    /// session's expiry. Judged against the backend-supplied timestamp
    /// ([`crate::core::router_info::RouterInfo::current_timestamp`]),
    /// never the relay's own wall clock, so every relay in the swarm
    /// agrees on when a session has expired regardless of local clock
    /// skew.
    pub fn expired(&self, backend_timestamp: u64) -> bool {
        backend_timestamp >= self.expire_timestamp()
    }

    /// Unconditionally refreshes expiry to `expire_timestamp` — what a
    /// repeated `RouteRequest` for an already-live session does (§4.2
    /// tie-break): `next_addr`, keys, and kbps envelopes never change
    /// once a session exists, but its lifetime is always extended to
    /// whatever the latest valid token says.
    pub fn refresh_expiry(&self, expire_timestamp: u64) {
        self.expire_timestamp.store(expire_timestamp, Ordering::Relaxed);
    }

    /// Extends expiry only if `expire_timestamp` is strictly greater than
    /// the session's current value — what a `ContinueRequest` does (§4.2
    /// tie-break): a continue token carrying a stale or equal expiry is a
    /// no-op rather than a regression.
    pub fn extend_expiry_if_greater(&self, expire_timestamp: u64) {
        self.expire_timestamp.fetch_max(expire_timestamp, Ordering::Relaxed);
    }
}
