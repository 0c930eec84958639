// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Everything a dispatcher thread needs to authenticate and forward a
//! packet: its own socket (one of several sharing a `SO_REUSEPORT` port)
//! plus the state shared across every thread in the process.

use std::{sync::Arc, time::Instant};

use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    core::{
        relay_manager::RelayManager, router_info::RouterInfo, session_map::SessionMap,
        throughput::ThroughputRecorder,
    },
    net::{address::Address, socket::RelaySocket},
};

/// Per-thread handle plus the state every dispatcher thread shares.
pub struct DispatchContext {
    pub socket: RelaySocket,
    /// This relay's own bind address, used as the "to" side of the
    /// advanced filter for packets addressed directly at this relay
    /// (pings) rather than at a session peer.
    pub bind_address: Address,
    pub sessions: Arc<SessionMap>,
    pub relays: Arc<RelayManager>,
    pub router_info: Arc<RouterInfo>,
    pub throughput: Arc<ThroughputRecorder>,
    pub relay_private_key: StaticSecret,
    pub router_public_key: PublicKey,
}

impl DispatchContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        socket: RelaySocket,
        bind_address: Address,
        sessions: Arc<SessionMap>,
        relays: Arc<RelayManager>,
        router_info: Arc<RouterInfo>,
        throughput: Arc<ThroughputRecorder>,
        relay_private_key: StaticSecret,
        router_public_key: PublicKey,
    ) -> Self {
        Self {
            socket,
            bind_address,
            sessions,
            relays,
            router_info,
            throughput,
            relay_private_key,
            router_public_key,
        }
    }
}
