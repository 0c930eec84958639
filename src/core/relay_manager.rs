// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Tracks this relay's neighbor relays: who they are, where to ping them,
//! and their rolling [`RouteStats`]. Ping histories live in a fixed arena
//! addressed by slot index rather than by pointer or reference, so the
//! whole table can be replaced by value on every backend update without
//! fighting the borrow checker over self-referential pointers into its
//! own storage.

use std::{sync::Mutex, time::Instant};

use crate::{
    consts::{MAX_RELAYS, PING_RATE_SECONDS},
    core::{ping_history::PingHistory, route_stats::RouteStats},
    net::address::Address,
};

const INVALID_PING_TIME: f64 = -10000.0;

#[derive(Clone, Copy)]
pub struct PingData {
    pub sequence: u64,
    pub addr: Address,
}

#[derive(Clone)]
struct Relay {
    id: u64,
    v3_id: u64,
    last_ping_time: f64,
    addr: Address,
    history_slot: usize,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            id: 0,
            v3_id: 0,
            last_ping_time: INVALID_PING_TIME,
            addr: Address::None,
            history_slot: 0,
        }
    }
}

struct Inner {
    relays: Vec<Relay>,
    history: Vec<PingHistory>,
    started_at: Instant,
}

/// Tracked view of one neighbor relay, returned from [`RelayManager::stats`].
pub struct RelayStats {
    pub id: u64,
    pub addr: Address,
    pub route_stats: RouteStats,
}

pub struct RelayManager {
    inner: Mutex<Inner>,
}

impl RelayManager {
    pub fn new() -> Self {
        let history = (0..MAX_RELAYS).map(|_| PingHistory::new()).collect();
        Self {
            inner: Mutex::new(Inner { relays: Vec::new(), history, started_at: Instant::now() }),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("relay manager mutex poisoned");
        inner.relays.clear();
        for history in &mut inner.history {
            history.clear();
        }
    }

    fn elapsed(inner: &Inner) -> f64 {
        inner.started_at.elapsed().as_secs_f64()
    }

    /// Reconciles the tracked relay set against a fresh backend update.
    /// Relays present in both the old and new set keep their ping history
    /// and accumulated stats; relays that dropped out of the update free
    /// their history slot for reuse by a newly appearing relay.
    /// `v3_update` selects which of a relay's two ID fields (current vs.
    /// legacy v3 backend) this update is allowed to assign.
    pub fn update(&self, v3_update: bool, ids: &[u64], addrs: &[Address]) {
        assert_eq!(ids.len(), addrs.len());
        assert!(ids.len() <= MAX_RELAYS);

        let mut inner = self.inner.lock().expect("relay manager mutex poisoned");
        let mut history_slot_taken = vec![false; MAX_RELAYS];
        let mut found = vec![false; ids.len()];
        let mut kept: Vec<Relay> = Vec::with_capacity(ids.len());

        for relay in &inner.relays {
            for (j, addr) in addrs.iter().enumerate() {
                if relay.addr == *addr {
                    found[j] = true;
                    let mut updated = relay.clone();
                    if v3_update {
                        updated.v3_id = ids[j];
                    } else {
                        updated.id = ids[j];
                    }
                    history_slot_taken[updated.history_slot] = true;
                    kept.push(updated);
                }
            }
        }

        for (i, addr) in addrs.iter().enumerate() {
            if found[i] {
                continue;
            }
            let slot = history_slot_taken
                .iter()
                .position(|taken| !taken)
                .expect("fewer than MAX_RELAYS relays are ever tracked at once");
            history_slot_taken[slot] = true;
            inner.history[slot].clear();
            let mut relay = Relay { addr: *addr, history_slot: slot, ..Relay::default() };
            if v3_update {
                relay.v3_id = ids[i];
            } else {
                relay.id = ids[i];
            }
            kept.push(relay);
        }

        let now = Self::elapsed(&inner);
        let count = kept.len();
        for (i, relay) in kept.iter_mut().enumerate() {
            // Evenly spreads initial ping times across the interval so a
            // large relay-set update doesn't burst every ping at once.
            relay.last_ping_time =
                now - PING_RATE_SECONDS + (i as f64) * PING_RATE_SECONDS / (count.max(1) as f64);
        }

        inner.relays = kept;
    }

    /// Records a pong from `from` for `seq`, returning `true` if it
    /// matched a relay this manager is currently tracking.
    pub fn process_pong(&self, from: Address, seq: u64) -> bool {
        let mut inner = self.inner.lock().expect("relay manager mutex poisoned");
        let now = Self::elapsed(&inner);
        let slot = inner.relays.iter().find(|r| r.addr == from).map(|r| r.history_slot);
        match slot {
            Some(slot) => {
                inner.history[slot].pong_received(seq, now);
                true
            },
            None => false,
        }
    }

    /// Sequence numbers and addresses to ping right now: every tracked
    /// relay whose last ping is at least [`PING_RATE_SECONDS`] old.
    pub fn due_for_ping(&self) -> Vec<PingData> {
        let mut inner = self.inner.lock().expect("relay manager mutex poisoned");
        let now = Self::elapsed(&inner);
        let due: Vec<usize> = inner
            .relays
            .iter()
            .enumerate()
            .filter(|(_, r)| now - r.last_ping_time >= PING_RATE_SECONDS)
            .map(|(i, _)| i)
            .collect();

        let mut out = Vec::with_capacity(due.len());
        for i in due {
            let slot = inner.relays[i].history_slot;
            let sequence = inner.history[slot].ping_sent(now);
            inner.relays[i].last_ping_time = now;
            out.push(PingData { sequence, addr: inner.relays[i].addr });
        }
        out
    }

    pub fn stats(&self, start: f64, end: f64, safety: f64) -> Vec<RelayStats> {
        let inner = self.inner.lock().expect("relay manager mutex poisoned");
        inner
            .relays
            .iter()
            .map(|relay| RelayStats {
                id: relay.id,
                addr: relay.addr,
                route_stats: RouteStats::compute(&inner.history[relay.history_slot], start, end, safety),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("relay manager mutex poisoned").relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RelayManager {
    fn default() -> Self {
        Self::new()
    }
}
