// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Aggregates a neighbor relay's [`PingHistory`] over `[start, end]` into
//! RTT, jitter, and packet-loss figures, the numbers reported to the
//! backend and used to pick routes.
//!
//! Packet loss is computed over a trailing "safe subwindow" `[start, end -
//! safety]`, excluding the most recent `safety` seconds because pongs for
//! pings sent that recently may simply not have arrived yet — counting
//! them as lost would overstate loss on every single sample.

use crate::{consts::DEFAULT_MEAN_RTT_MS, core::ping_history::PingHistory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteStats {
    pub rtt_ms: f32,
    /// `-1.0` when there were no jitter samples to compute from.
    pub jitter_ms: f32,
    /// `-1.0` when no pings fell inside the safe subwindow at all.
    pub packet_loss_percent: f32,
}

impl RouteStats {
    pub fn compute(history: &PingHistory, start: f64, end: f64, safety: f64) -> Self {
        assert!(start < end);

        let mut pings_sent_in_safe_window = 0u32;
        let mut pongs_received_in_safe_window = 0u32;
        let mut mean_rtt_ms = 0.0f64;
        let mut num_pongs = 0u32;

        for i in 0..history.len() {
            let entry = history.entry(i);
            if entry.time_ping_sent < start {
                continue;
            }
            if entry.time_ping_sent <= end - safety {
                pings_sent_in_safe_window += 1;
                if entry.time_pong_received >= entry.time_ping_sent {
                    pongs_received_in_safe_window += 1;
                }
            }
            if entry.time_ping_sent <= end && entry.time_pong_received > entry.time_ping_sent {
                mean_rtt_ms += 1000.0 * (entry.time_pong_received - entry.time_ping_sent);
                num_pongs += 1;
            }
        }

        let mean_rtt_ms =
            if num_pongs > 0 { mean_rtt_ms / f64::from(num_pongs) } else { DEFAULT_MEAN_RTT_MS };

        let packet_loss_percent = if pings_sent_in_safe_window > 0 {
            (100.0
                * (1.0
                    - f64::from(pongs_received_in_safe_window)
                        / f64::from(pings_sent_in_safe_window))) as f32
        } else {
            -1.0
        };

        let mut num_jitter_samples = 0u32;
        let mut stddev_rtt = 0.0f64;
        for i in 0..history.len() {
            let entry = history.entry(i);
            if entry.time_ping_sent >= start
                && entry.time_ping_sent <= end
                && entry.time_pong_received > entry.time_ping_sent
            {
                let rtt_ms = 1000.0 * (entry.time_pong_received - entry.time_ping_sent);
                if rtt_ms >= mean_rtt_ms {
                    let error = rtt_ms - mean_rtt_ms;
                    stddev_rtt += error * error;
                    num_jitter_samples += 1;
                }
            }
        }

        let jitter_ms = if num_jitter_samples > 0 {
            3.0 * (stddev_rtt / f64::from(num_jitter_samples)).sqrt()
        } else {
            -1.0
        };

        RouteStats {
            rtt_ms: mean_rtt_ms as f32,
            jitter_ms: jitter_ms as f32,
            packet_loss_percent,
        }
    }
}
