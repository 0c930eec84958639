// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-packet-category throughput counters, drained and logged once a
//! second by [`ThroughputRecorder::spawn_reporter`]. Structured as
//! `tracing` fields rather than a bespoke console writer — `RELAY_LOG_FILE`
//! (wired in [`crate::cfg::logger`]) lets an operator route this specific
//! stream to its own rolling file without touching the rest of the log.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    RelayPing,
    RelayPong,
    RouteRequest,
    RouteResponse,
    ContinueRequest,
    ContinueResponse,
    ClientToServer,
    ServerToClient,
    SessionPing,
    SessionPong,
    NearPing,
    Unknown,
}

const CATEGORY_COUNT: usize = 12;

impl Category {
    pub(crate) fn index(self) -> usize {
        match self {
            Category::RelayPing => 0,
            Category::RelayPong => 1,
            Category::RouteRequest => 2,
            Category::RouteResponse => 3,
            Category::ContinueRequest => 4,
            Category::ContinueResponse => 5,
            Category::ClientToServer => 6,
            Category::ServerToClient => 7,
            Category::SessionPing => 8,
            Category::SessionPong => 9,
            Category::NearPing => 10,
            Category::Unknown => 11,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Category::RelayPing => "relay_ping",
            Category::RelayPong => "relay_pong",
            Category::RouteRequest => "route_request",
            Category::RouteResponse => "route_response",
            Category::ContinueRequest => "continue_request",
            Category::ContinueResponse => "continue_response",
            Category::ClientToServer => "client_to_server",
            Category::ServerToClient => "server_to_client",
            Category::SessionPing => "session_ping",
            Category::SessionPong => "session_pong",
            Category::NearPing => "near_ping",
            Category::Unknown => "unknown",
        }
    }
}

#[derive(Default)]
struct Counter {
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl Counter {
    fn add(&self, bytes: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn take(&self) -> (u64, u64) {
        (self.packets.swap(0, Ordering::Relaxed), self.bytes.swap(0, Ordering::Relaxed))
    }
}

pub struct ThroughputRecorder {
    counters: [Counter; CATEGORY_COUNT],
}

impl ThroughputRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { counters: Default::default() })
    }

    pub fn record(&self, category: Category, bytes: usize) {
        self.counters[category.index()].add(bytes);
    }

    /// Spawns the once-a-second drain-and-log thread. Exits once
    /// `should_loop` is cleared, on the same poll cadence the dispatcher
    /// threads use so shutdown isn't held up waiting on this one.
    pub fn spawn_reporter(self: &Arc<Self>, should_loop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
        let recorder = Arc::clone(self);
        thread::Builder::new()
            .name("throughput-reporter".into())
            .spawn(move || {
                let mut waited = Duration::ZERO;
                while should_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                    waited += Duration::from_millis(100);
                    if waited < Duration::from_secs(1) {
                        continue;
                    }
                    waited = Duration::ZERO;
                    recorder.report();
                }
            })
            .expect("spawning the throughput reporter thread")
    }

    /// Drains every named category (everything but [`Category::Unknown`])
    /// and returns its `(label, packets, bytes)` triple. Used by the
    /// backend client to fold a second's traffic into its `TrafficStats`
    /// payload; independent of [`Self::spawn_reporter`]'s own drain — both
    /// are zeroing swaps, so whichever runs first in a given second claims
    /// that interval's count, but nothing is double-counted or lost.
    pub fn drain_named(&self) -> Vec<(&'static str, u64, u64)> {
        [
            Category::RelayPing,
            Category::RelayPong,
            Category::RouteRequest,
            Category::RouteResponse,
            Category::ContinueRequest,
            Category::ContinueResponse,
            Category::ClientToServer,
            Category::ServerToClient,
            Category::SessionPing,
            Category::SessionPong,
            Category::NearPing,
        ]
        .into_iter()
        .map(|category| {
            let (packets, bytes) = self.counters[category.index()].take();
            (category.label(), packets, bytes)
        })
        .collect()
    }

    fn report(&self) {
        let mut total_packets = 0u64;
        let mut total_bytes = 0u64;
        for category in [
            Category::RelayPing,
            Category::RelayPong,
            Category::RouteRequest,
            Category::RouteResponse,
            Category::ContinueRequest,
            Category::ContinueResponse,
            Category::ClientToServer,
            Category::ServerToClient,
            Category::SessionPing,
            Category::SessionPong,
            Category::NearPing,
        ] {
            let (packets, bytes) = self.counters[category.index()].take();
            total_packets += packets;
            total_bytes += bytes;
            if packets > 0 {
                tracing::info!(target: "throughput", category = category.label(), packets, bytes, "throughput");
            }
        }
        let (unknown_packets, unknown_bytes) = self.counters[Category::Unknown.index()].take();
        tracing::info!(
            target: "throughput",
            total_packets,
            total_bytes,
            unknown_packets,
            unknown_bytes,
            "throughput.total"
        );
    }
}
