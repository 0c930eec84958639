// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use rand::rngs::OsRng;
use relay_node::{
    consts::FILTER_PREAMBLE_SIZE,
    core::{
        filter, relay_manager::RelayManager, router_info::RouterInfo, session_map::SessionMap,
        throughput::ThroughputRecorder,
    },
    dispatch::context::DispatchContext,
    net::{address::Address, socket::RelaySocket},
};
use x25519_dalek::{PublicKey, StaticSecret};

/// Router magic every harness packet is stamped with; arbitrary but fixed
/// so every test observes the same filter behavior.
pub const MAGIC: [u8; 8] = [0xAA; 8];

/// Everything one scenario test needs: a dispatch context wired to a real
/// loopback socket, a second loopback socket standing in for "the next
/// hop", and the keypairs needed to mint tokens this relay will accept.
pub struct Harness {
    pub ctx: DispatchContext,
    pub peer: RelaySocket,
    pub peer_addr: Address,
    pub router_secret: StaticSecret,
    pub router_public: PublicKey,
    pub relay_public: PublicKey,
}

pub fn build_harness() -> Harness {
    let socket = RelaySocket::bind("127.0.0.1:0".parse().expect("addr")).expect("bind relay socket");
    let bind_address = Address::from(socket.local_addr().expect("local addr"));

    let peer = RelaySocket::bind("127.0.0.1:0".parse().expect("addr")).expect("bind peer socket");
    let peer_addr = Address::from(peer.local_addr().expect("local addr"));

    let router_secret = StaticSecret::new(OsRng);
    let router_public = PublicKey::from(&router_secret);
    let relay_secret = StaticSecret::new(OsRng);
    let relay_public = PublicKey::from(&relay_secret);

    let router_info = Arc::new(RouterInfo::new(MAGIC));
    let sessions = Arc::new(SessionMap::new());
    let relays = Arc::new(RelayManager::new());
    let throughput = ThroughputRecorder::new();

    let ctx = DispatchContext::new(
        socket,
        bind_address,
        sessions,
        relays,
        router_info,
        throughput,
        relay_secret,
        router_public,
    );

    Harness { ctx, peer, peer_addr, router_secret, router_public, relay_public }
}

/// An arbitrary "client" address distinct from anything the harness binds,
/// used as the `from` side of inbound packets that don't need a real
/// socket behind them.
pub fn client_addr() -> Address {
    Address::V4 { octets: [198, 51, 100, 7], port: 33221 }
}

/// Wraps `body` in a freshly stamped filter preamble, as a genuine sender
/// on the wire would, addressed from `from` to the harness relay's own
/// bind address.
pub fn envelope(ctx: &DispatchContext, packet_type: u8, from: Address, body: &[u8]) -> Vec<u8> {
    let total_len = FILTER_PREAMBLE_SIZE + body.len();
    let mut out = vec![0u8; total_len];
    filter::write_filter(
        &mut out,
        packet_type,
        &ctx.router_info.current(),
        from.filter_key(),
        ctx.bind_address.filter_key(),
        total_len as u16,
    );
    out[FILTER_PREAMBLE_SIZE..].copy_from_slice(body);
    out
}

/// Reads one datagram off `socket`, returning its length, or `None` if
/// nothing arrived before the socket's receive timeout — used to assert a
/// handler did or did not forward a packet.
pub fn try_recv(socket: &RelaySocket, buf: &mut [u8]) -> Option<usize> {
    socket.recv(buf).ok().map(|(len, _from)| len)
}
