// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The pinger thread: every 10 ms, asks the [`RelayManager`] which
//! neighbors are due for a ping and sends each one a fresh `RelayPing`.
//!
//! Runs on its own socket rather than borrowing a dispatcher's — `sendto`
//! is reentrant and a `SO_REUSEPORT`-bound socket is cheap, so there is no
//! need to thread a shared handle through the dispatcher pool just for
//! this one send path.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::trace;

use crate::{
    consts::{packet_type, FILTER_PREAMBLE_SIZE, PINGER_TICK_MILLIS, RELAY_PING_SIZE},
    core::{relay_manager::RelayManager, router_info::RouterInfo, throughput::Category, throughput::ThroughputRecorder},
    error::RelayError,
    net::{address::Address, socket::RelaySocket},
};

pub fn spawn_pinger(
    bind_addr: SocketAddr,
    relays: Arc<RelayManager>,
    router_info: Arc<RouterInfo>,
    throughput: Arc<ThroughputRecorder>,
    should_loop: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>, RelayError> {
    let socket = RelaySocket::bind(bind_addr).map_err(RelayError::Socket)?;
    let bind_address = Address::from(socket.local_addr().map_err(RelayError::Socket)?);

    let handle = thread::Builder::new()
        .name("pinger".into())
        .spawn(move || run_pinger(socket, bind_address, relays, router_info, throughput, should_loop))
        .map_err(RelayError::Socket)?;
    Ok(handle)
}

fn run_pinger(
    socket: RelaySocket,
    bind_address: Address,
    relays: Arc<RelayManager>,
    router_info: Arc<RouterInfo>,
    throughput: Arc<ThroughputRecorder>,
    should_loop: Arc<AtomicBool>,
) {
    let mut own_address_bytes = [0u8; crate::net::address::ADDRESS_BYTES];
    bind_address.write(&mut own_address_bytes);

    while should_loop.load(Ordering::Relaxed) {
        for target in relays.due_for_ping() {
            send_ping(&socket, &router_info, &throughput, bind_address, &own_address_bytes, target.sequence, target.addr);
        }
        thread::sleep(Duration::from_millis(PINGER_TICK_MILLIS));
    }
}

fn send_ping(
    socket: &RelaySocket,
    router_info: &RouterInfo,
    throughput: &ThroughputRecorder,
    bind_address: Address,
    own_address_bytes: &[u8; crate::net::address::ADDRESS_BYTES],
    sequence: u64,
    to: Address,
) {
    let total_len = FILTER_PREAMBLE_SIZE + RELAY_PING_SIZE;
    let mut out = vec![0u8; total_len];
    crate::core::filter::write_filter(
        &mut out,
        packet_type::RELAY_PING,
        &router_info.current(),
        bind_address.filter_key(),
        to.filter_key(),
        total_len as u16,
    );
    let body = &mut out[FILTER_PREAMBLE_SIZE..];
    body[0..8].copy_from_slice(&sequence.to_le_bytes());
    body[8..8 + crate::net::address::ADDRESS_BYTES].copy_from_slice(own_address_bytes);

    match socket.send(&out, to) {
        Ok(_) => throughput.record(Category::RelayPing, total_len),
        Err(err) => trace!(%to, %err, "pinger send failed"),
    }
}
