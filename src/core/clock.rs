// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single process-wide monotonic clock, seconds since process start.
//!
//! [`crate::core::bandwidth::BandwidthLimiter`] and the dispatcher's
//! strict-ordering checks all need a common notion of "now" that never
//! goes backwards; [`std::time::Instant`] already gives us that, this
//! just makes it a f64 seconds value so it can be compared directly
//! against the f64 timestamps [`crate::core::ping_history::PingHistory`]
//! and [`crate::core::relay_manager::RelayManager`] already use.

use std::time::Instant;

use once_cell::sync::Lazy;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Seconds elapsed since this process started.
pub fn now_secs() -> f64 {
    PROCESS_START.elapsed().as_secs_f64()
}
