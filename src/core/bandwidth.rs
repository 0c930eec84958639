// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-session bandwidth accounting. [`BandwidthLimiter::add_packet`] is
//! the only thing that ever causes a packet to be dropped for bandwidth
//! reasons — a hard cap per [`BANDWIDTH_INTERVAL_SECONDS`] window.
//! `average_kbps` is a separately maintained EMA kept purely for
//! telemetry; nothing in the forwarding path consults it, so a burst that
//! clears the hard cap is never throttled just because the EMA is still
//! catching up.

use crate::consts::BANDWIDTH_INTERVAL_SECONDS;

/// Ethernet + IP + UDP overhead folded into every wire-bits computation:
/// 14 bytes Ethernet header, 20 bytes IPv4 header, 8 bytes UDP header, 4
/// bytes Ethernet FCS.
pub fn wire_packet_bits(packet_bytes: usize) -> u64 {
    ((14 + 20 + 8 + packet_bytes + 4) * 8) as u64
}

pub struct BandwidthLimiter {
    last_check_time: f64,
    bits_sent: u64,
    average_kbps: f64,
}

impl BandwidthLimiter {
    pub fn new() -> Self {
        Self { last_check_time: -100.0, bits_sent: 0, average_kbps: 0.0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Accounts `packet_bits` sent at `current_time` and reports whether
    /// the session has now exceeded `kbps_allowed` for the current
    /// interval. The interval itself resets lazily, the first time it is
    /// observed to have elapsed, rather than on a timer.
    pub fn add_packet(&mut self, current_time: f64, kbps_allowed: u32, packet_bits: u64) -> bool {
        let invalid = self.last_check_time < 0.0;
        if invalid || current_time - self.last_check_time >= BANDWIDTH_INTERVAL_SECONDS - 0.001 {
            self.bits_sent = 0;
            self.last_check_time = current_time;
        }
        self.bits_sent += packet_bits;
        let allowed_bits = (f64::from(kbps_allowed) * 1000.0 * BANDWIDTH_INTERVAL_SECONDS) as u64;
        self.bits_sent > allowed_bits
    }

    fn add_sample(&mut self, kbps: f64) {
        if self.average_kbps == 0.0 && kbps != 0.0 {
            self.average_kbps = kbps;
            return;
        }
        if self.average_kbps != 0.0 && kbps == 0.0 {
            self.average_kbps = 0.0;
            return;
        }
        let delta = kbps - self.average_kbps;
        if delta < 0.000_001 {
            self.average_kbps = kbps;
            return;
        }
        self.average_kbps += delta * 0.1;
    }

    /// Updates and returns the observation-only EMA of throughput. Safe to
    /// call at any cadence; it is a no-op unless at least 100ms has
    /// elapsed since the last check.
    pub fn usage_kbps(&mut self, current_time: f64) -> f64 {
        let invalid = self.last_check_time < 0.0;
        if !invalid {
            let delta_time = current_time - self.last_check_time;
            if delta_time > 0.1 {
                let kbps = self.bits_sent as f64 / delta_time / 1000.0;
                self.add_sample(kbps);
            }
        }
        self.average_kbps
    }
}

impl Default for BandwidthLimiter {
    fn default() -> Self {
        Self::new()
    }
}
