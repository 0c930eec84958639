// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The router's packet-filter magic, as communicated by the backend.
//! Rotated periodically so a compromised magic value ages out, but a
//! rotation lands asynchronously across every relay in the swarm — a
//! relay must keep accepting the immediately-previous magic for a while
//! after it rotates, or the whole swarm would briefly reject each other's
//! traffic mid-rollover.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    RwLock,
};

struct Magics {
    previous: [u8; 8],
    current: [u8; 8],
    next: [u8; 8],
}

pub struct RouterInfo {
    magics: RwLock<Magics>,
    /// Backend clock, seconds, as of the last successful update. Session
    /// expiry and purge are judged against this, not the relay's own wall
    /// clock, so every relay in the swarm agrees on what "expired" means.
    current_timestamp: AtomicU64,
}

impl RouterInfo {
    pub fn new(current: [u8; 8]) -> Self {
        Self {
            magics: RwLock::new(Magics { previous: current, current, next: current }),
            current_timestamp: AtomicU64::new(0),
        }
    }

    pub fn current_timestamp(&self) -> u64 {
        self.current_timestamp.load(Ordering::Relaxed)
    }

    pub fn set_current_timestamp(&self, timestamp: u64) {
        self.current_timestamp.store(timestamp, Ordering::Relaxed);
    }

    /// Installs a new upcoming magic. Does not yet affect what is
    /// accepted — call [`Self::rotate`] once the backend confirms the
    /// swarm-wide cutover.
    pub fn set_next(&self, next: [u8; 8]) {
        let mut magics = self.magics.write().expect("router info lock poisoned");
        magics.next = next;
    }

    /// Advances `current` to `next` and `previous` to the old `current`,
    /// so the magic that was current up to this call is still accepted
    /// for one more rotation.
    pub fn rotate(&self) {
        let mut magics = self.magics.write().expect("router info lock poisoned");
        magics.previous = magics.current;
        magics.current = magics.next;
    }

    /// Installs all three magics at once, exactly as the backend reports
    /// them on every successful `/relay_update` (§4.7) — the backend is
    /// the single source of truth for the rotation, so a relay never
    /// derives `previous`/`next` locally once it has talked to the
    /// backend at all.
    pub fn set_magics(&self, previous: [u8; 8], current: [u8; 8], next: [u8; 8]) {
        let mut magics = self.magics.write().expect("router info lock poisoned");
        magics.previous = previous;
        magics.current = current;
        magics.next = next;
    }

    pub fn current(&self) -> [u8; 8] {
        self.magics.read().expect("router info lock poisoned").current
    }

    /// Snapshot of all three live magics, in `[previous, current, next]`
    /// order, for the advanced packet filter to try each of in turn —
    /// `advanced_packet_filter` only ever checks one specific magic at a
    /// time, so "any of three" is implemented by the caller trying each.
    pub fn snapshot(&self) -> [[u8; 8]; 3] {
        let magics = self.magics.read().expect("router info lock poisoned");
        [magics.previous, magics.current, magics.next]
    }

    /// Accepts a packet stamped with any of the previous, current, or
    /// next magic — "any of three" rather than an exact match, so a
    /// packet filtered against a magic this relay hasn't rotated to yet
    /// (or has just rotated past) is not spuriously rejected.
    pub fn accepts(&self, magic: &[u8; 8]) -> bool {
        let magics = self.magics.read().expect("router info lock poisoned");
        *magic == magics.previous || *magic == magics.current || *magic == magics.next
    }
}
