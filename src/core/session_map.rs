// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session table. Deliberately a single [`Mutex`]-guarded [`BTreeMap`]
//! rather than a sharded concurrent map (the rest of this crate otherwise
//! follows the original's `DashMap` habit for other lookup tables): a
//! route-response handler reads a session's kbps counters and the map's
//! overall size in the same critical section to decide whether to accept
//! new load, and that combined read must observe a single consistent
//! snapshot. A sharded map cannot offer that without its own external
//! lock, at which point it buys nothing over a plain mutex.

use std::{collections::BTreeMap, sync::Arc, sync::Mutex};

use crate::core::session::Session;

pub type SessionRef = Arc<Session>;

pub struct SessionMap {
    inner: Mutex<BTreeMap<u64, SessionRef>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self { inner: Mutex::new(BTreeMap::new()) }
    }

    pub fn set(&self, key: u64, value: SessionRef) {
        let mut guard = self.inner.lock().expect("session map mutex poisoned");
        guard.insert(key, value);
    }

    pub fn get(&self, key: u64) -> Option<SessionRef> {
        let guard = self.inner.lock().expect("session map mutex poisoned");
        guard.get(&key).cloned()
    }

    pub fn exists(&self, key: u64) -> bool {
        let guard = self.inner.lock().expect("session map mutex poisoned");
        guard.contains_key(&key)
    }

    pub fn erase(&self, key: u64) -> bool {
        let mut guard = self.inner.lock().expect("session map mutex poisoned");
        guard.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("session map mutex poisoned");
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every session whose expiry has passed as of `backend_timestamp`.
    /// Called once per successful backend update (§4.7), not on a local
    /// timer, so expiry is judged the same way on every relay.
    pub fn purge(&self, backend_timestamp: u64) {
        let mut guard = self.inner.lock().expect("session map mutex poisoned");
        guard.retain(|_, session| !session.expired(backend_timestamp));
    }

    /// Total uplink + downlink kbps currently committed across every live
    /// session, read and summed under one lock acquisition so it can never
    /// observe a session mid-insert or mid-remove.
    pub fn total_committed_kbps(&self) -> u64 {
        let guard = self.inner.lock().expect("session map mutex poisoned");
        guard
            .values()
            .map(|session| {
                let state = session.state.lock().expect("session state mutex poisoned");
                u64::from(state.kbps_up) + u64::from(state.kbps_down)
            })
            .sum()
    }

    /// Uplink and downlink kbps committed across every live session, split
    /// instead of summed — feeds `TrafficStats.EnvelopeKbpsUp`/`Down`
    /// separately, same single-lock-acquisition guarantee as
    /// [`Self::total_committed_kbps`].
    pub fn committed_kbps(&self) -> (u64, u64) {
        let guard = self.inner.lock().expect("session map mutex poisoned");
        guard.values().fold((0u64, 0u64), |(up, down), session| {
            let state = session.state.lock().expect("session state mutex poisoned");
            (up + u64::from(state.kbps_up), down + u64::from(state.kbps_down))
        })
    }
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new()
    }
}
