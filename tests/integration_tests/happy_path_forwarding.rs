// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use rand::rngs::OsRng;
use relay_node::{
    consts::{packet_type, FILTER_PREAMBLE_SIZE, HEADER_SIZE},
    core::{filter, header::{Header, SessionFlags}},
    dispatch::packet_kind::{PacketHandler, PacketKind},
    token::{route_token::ROUTE_TOKEN_ENCRYPTED_SIZE, RouteToken},
};
use x25519_dalek::StaticSecret;

use crate::integration_tests::common::{build_harness, client_addr, envelope, try_recv};

/// A RouteRequest carrying two stacked tokens (one for this relay, one for
/// the next hop) must create a session, strip its own token, and forward
/// the remainder on to the address its own token named.
#[test]
fn route_request_establishes_a_session_and_forwards_the_remainder() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let backend_secret = StaticSecret::new(OsRng);
    let client_from = client_addr();

    let own_token = RouteToken {
        expire_timestamp: ctx.router_info.current_timestamp() + 3600,
        session_id: 0xDEAD_BEEF,
        session_version: 1,
        session_flags: SessionFlags::empty(),
        kbps_up: 2_000,
        kbps_down: 4_000,
        next_addr: harness.peer_addr,
        private_key: [0x42; 32],
    };
    let own_sealed = own_token.encrypt(&backend_secret, &harness.relay_public, [1u8; 24]);

    // A second, opaque token stands in for the next hop's own route
    // token — this relay never looks inside it.
    let next_hop_opaque = [0x99u8; ROUTE_TOKEN_ENCRYPTED_SIZE];

    let mut body = Vec::with_capacity(1 + own_sealed.len() + next_hop_opaque.len());
    body.push(0);
    body.extend_from_slice(&own_sealed);
    body.extend_from_slice(&next_hop_opaque);

    let packet = envelope(ctx, packet_type::ROUTE_REQUEST, client_from, &body);
    let mut buf = packet.clone();
    let len = buf.len();

    let handler = PacketKind::from_type_byte(packet_type::ROUTE_REQUEST).expect("known type");
    handler.handle(ctx, &mut buf, len, client_from);

    let key = own_token.session_key();
    let session = ctx.sessions.get(key).expect("session created");
    assert_eq!(session.prev_addr, client_from);
    assert_eq!(session.next_addr, harness.peer_addr);

    let mut recv_buf = [0u8; 2048];
    let recv_len = try_recv(&harness.peer, &mut recv_buf).expect("forwarded to next hop");
    let forwarded_body = &recv_buf[FILTER_PREAMBLE_SIZE..recv_len];
    assert_eq!(forwarded_body.len(), 1 + next_hop_opaque.len());
    assert_eq!(&forwarded_body[1..], &next_hop_opaque[..]);
}

/// Once a session exists, a `ClientToServer` packet with a valid header
/// tag forwards to `session.next_addr` unchanged, and the forwarded
/// packet carries a fresh preamble rather than the one it arrived with.
#[test]
fn client_to_server_forwards_an_established_session_payload() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let session_id = 7u64;
    let session_version = 1u8;
    let private_key = [0x11u8; 32];
    let client_from = client_addr();

    let session = std::sync::Arc::new(relay_node::core::session::Session::new(
        session_id,
        session_version,
        ctx.router_info.current_timestamp() + 3600,
        client_from,
        harness.peer_addr,
        private_key,
    ));
    {
        let mut state = session.state.lock().expect("lock");
        state.kbps_up = 10_000;
    }
    let key = session_id ^ u64::from(session_version);
    ctx.sessions.set(key, session);

    let header = Header {
        packet_type: packet_type::CLIENT_TO_SERVER,
        sequence: 1,
        session_id,
        session_version,
        session_flags: SessionFlags::empty(),
    };
    let mut header_bytes = [0u8; HEADER_SIZE];
    header.write(&private_key, &mut header_bytes);

    let mut body = header_bytes.to_vec();
    body.extend_from_slice(b"gameplay-payload");

    let packet = envelope(ctx, packet_type::CLIENT_TO_SERVER, client_from, &body);
    let mut buf = packet.clone();
    let len = buf.len();
    let handler = PacketKind::from_type_byte(packet_type::CLIENT_TO_SERVER).expect("known type");
    handler.handle(ctx, &mut buf, len, client_from);

    let mut recv_buf = [0u8; 2048];
    let recv_len = try_recv(&harness.peer, &mut recv_buf).expect("forwarded");
    let forwarded_body = &recv_buf[FILTER_PREAMBLE_SIZE..recv_len];
    assert_eq!(forwarded_body, body.as_slice());

    // The forwarded preamble must validate against an (own-address, peer)
    // pair, proving it was freshly stamped rather than copied verbatim.
    let from_key = ctx.bind_address.filter_key();
    let to_key = harness.peer_addr.filter_key();
    assert!(filter::advanced_packet_filter(
        &recv_buf[..recv_len],
        &ctx.router_info.current(),
        from_key,
        to_key,
        recv_len as u16,
    ));
}
