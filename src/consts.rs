// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Protocol-fixed sizes and timing constants shared across modules.

/// Maximum bytes of a forwarded payload (excludes the authenticated header).
pub const MTU: usize = 1300;

/// `type(1) | sequence(8) | session_id(8) | session_version(1) | session_flags(1)`
/// followed by a 16-byte AEAD tag.
pub const HEADER_SIZE: usize = 1 + 8 + 8 + 1 + 1 + 16;

/// Wire size of an [`crate::net::address::Address`]: type byte + 16 address
/// bytes + 2 port bytes.
pub const ADDRESS_SIZE: usize = 19;

/// `type(1) | pittle(2) | chonkle(15)` anti-spoofing preamble every packet
/// carries ahead of its authenticated header.
pub const FILTER_PREAMBLE_SIZE: usize = 18;

/// `RelayPing`/`RelayPong` payload, carried after the filter preamble:
/// sequence(8) + bind address(19) + reserved padding(6) = 33 bytes, matching
/// the total size of a `NearPing`.
pub const RELAY_PING_SIZE: usize = 33;

/// Trailing bytes stripped off a `NearPing` to produce its `NearPong`.
pub const NEAR_PING_TRAILER: usize = 16;

/// Ring size backing [`crate::core::replay::ReplayWindow`] and
/// [`crate::core::ping_history::PingHistory`].
pub const REPLAY_WINDOW_SIZE: usize = 256;

/// Maximum number of neighbor relays a [`crate::core::relay_manager::RelayManager`]
/// tracks at once.
pub const MAX_RELAYS: usize = 256;

/// Interval between relay pings sent to each known neighbor.
pub const PING_RATE_SECONDS: f64 = 0.25;

/// Trailing window over which `RouteStats` are aggregated for reporting.
pub const STATS_WINDOW_SECONDS: f64 = 10.0;

/// Guard window at the end of a stats window excluded from packet-loss
/// accounting because those pings' pongs may still be in flight.
pub const PING_SAFETY_SECONDS: f64 = 1.0;

/// Sliding-window length used by [`crate::core::bandwidth::BandwidthLimiter`].
pub const BANDWIDTH_INTERVAL_SECONDS: f64 = 1.0;

/// Fallback mean RTT (milliseconds) reported when a [`crate::core::ping_history::PingHistory`]
/// has no completed pongs in the window.
pub const DEFAULT_MEAN_RTT_MS: f64 = 10_000.0;

/// Maximum consecutive failed backend updates tolerated before the relay
/// treats the backend as unreachable and exits.
pub const MAX_CONSECUTIVE_BACKEND_FAILURES: u32 = 10;

/// Wall-clock ceiling, in seconds, on consecutive backend-update failures;
/// ignored if a success occurs before it elapses.
pub const BACKEND_FAILURE_CEILING_SECONDS: u64 = 60;

/// Maximum time spent trying to flush a final `ShuttingDown` update before
/// exiting on `SIGTERM`/`SIGHUP`.
pub const CLEAN_SHUTDOWN_MAX_WAIT_SECONDS: u64 = 30;

/// Backend update-loop cadence.
pub const BACKEND_UPDATE_INTERVAL_SECONDS: u64 = 1;

/// Receive timeout applied to every dispatcher/pinger socket so shutdown
/// latency is bounded.
pub const RECV_TIMEOUT_MILLIS: u64 = 100;

/// Pinger wake-up cadence.
pub const PINGER_TICK_MILLIS: u64 = 10;

/// Total timeout for a single blocking backend HTTP request.
pub const BACKEND_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// `magic_request_protection` sentinel sent with `/relay_init`.
pub const INIT_REQUEST_MAGIC: u32 = 0x9083_708f;

/// Wire protocol version exchanged with the backend.
pub const BACKEND_PROTOCOL_VERSION: u32 = 0;

/// First-byte packet type tags. Values are the relay's own numbering, not
/// the router/backend's internal enumeration — the filter only cares that
/// every tag falls in `MIN_PACKET_TYPE..=MAX_PACKET_TYPE`.
pub mod packet_type {
    pub const RELAY_PING: u8 = 0x01;
    pub const RELAY_PONG: u8 = 0x02;
    pub const ROUTE_REQUEST: u8 = 0x03;
    pub const ROUTE_RESPONSE: u8 = 0x04;
    pub const CONTINUE_REQUEST: u8 = 0x05;
    pub const CONTINUE_RESPONSE: u8 = 0x06;
    pub const CLIENT_TO_SERVER: u8 = 0x07;
    pub const SERVER_TO_CLIENT: u8 = 0x08;
    pub const SESSION_PING: u8 = 0x09;
    pub const SESSION_PONG: u8 = 0x0A;
    pub const NEAR_PING: u8 = 0x0B;
    /// Not named in the backend's wire contract; chosen as the next free
    /// tag after `NEAR_PING` since a `NearPing` reply needs its own tag
    /// distinct from the probe it answers.
    pub const NEAR_PONG: u8 = 0x0C;
}
