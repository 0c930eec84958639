// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Spawns one dispatcher thread per CPU-sized processor count, each with
//! its own socket bound to the same port via `SO_REUSEPORT` — the kernel
//! spreads inbound datagrams across them by 4-tuple hash, so no userspace
//! fan-out step is needed.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    consts::{FILTER_PREAMBLE_SIZE, HEADER_SIZE, MTU},
    core::{
        relay_manager::RelayManager, router_info::RouterInfo, session_map::SessionMap,
        throughput::ThroughputRecorder,
    },
    dispatch::{context::DispatchContext, packet_kind::PacketKind},
    error::RelayError,
    net::{address::Address, socket::RelaySocket},
};

/// Largest datagram a dispatcher thread will ever need to read: filter
/// preamble, authenticated header, and up to one MTU of forwarded payload.
const MAX_PACKET_SIZE: usize = FILTER_PREAMBLE_SIZE + HEADER_SIZE + MTU;

#[allow(clippy::too_many_arguments)]
pub fn spawn_dispatchers(
    bind_addr: SocketAddr,
    processor_count: usize,
    sessions: Arc<SessionMap>,
    relays: Arc<RelayManager>,
    router_info: Arc<RouterInfo>,
    throughput: Arc<ThroughputRecorder>,
    relay_private_key: StaticSecret,
    router_public_key: PublicKey,
    should_loop: Arc<AtomicBool>,
) -> Result<Vec<thread::JoinHandle<()>>, RelayError> {
    let mut handles = Vec::with_capacity(processor_count);
    for index in 0..processor_count {
        let socket = RelaySocket::bind(bind_addr).map_err(RelayError::Socket)?;
        let bind_address = Address::from(socket.local_addr().map_err(RelayError::Socket)?);
        let ctx = DispatchContext::new(
            socket,
            bind_address,
            Arc::clone(&sessions),
            Arc::clone(&relays),
            Arc::clone(&router_info),
            Arc::clone(&throughput),
            relay_private_key.clone(),
            router_public_key,
        );
        let should_loop = Arc::clone(&should_loop);

        let handle = thread::Builder::new()
            .name(format!("dispatcher-{index}"))
            .spawn(move || run_dispatcher(ctx, should_loop))
            .map_err(RelayError::Socket)?;
        handles.push(handle);
    }
    Ok(handles)
}

fn run_dispatcher(ctx: DispatchContext, should_loop: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    while should_loop.load(Ordering::Relaxed) {
        let (len, from) = match ctx.socket.recv(&mut buf) {
            Ok(pair) => pair,
            Err(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
            {
                continue;
            },
            Err(err) => {
                tracing::debug!(%err, "dispatcher recv error");
                continue;
            },
        };

        if len == 0 {
            continue;
        }

        match PacketKind::from_type_byte(buf[0]) {
            Some(kind) => {
                use crate::dispatch::packet_kind::PacketHandler;
                kind.handle(&ctx, &mut buf, len, from);
            },
            None => {
                ctx.throughput.record(crate::core::throughput::Category::Unknown, len);
            },
        }
    }
}
