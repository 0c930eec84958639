// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use relay_node::{
    consts::{packet_type, HEADER_SIZE},
    core::{header::{Header, SessionFlags}, session::Session},
    dispatch::packet_kind::{PacketHandler, PacketKind},
};

use crate::integration_tests::common::{build_harness, client_addr, envelope, try_recv};

/// A session whose `expire_timestamp` is at or before the router's
/// current (backend-supplied) timestamp is treated as gone: packets
/// addressed at it are dropped exactly as if no session existed.
#[test]
fn packets_for_an_expired_session_are_dropped() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let session_id = 77u64;
    let session_version = 1u8;
    let private_key = [0x77u8; 32];
    let client_from = client_addr();

    // current_timestamp starts at 0; an expire_timestamp of 0 is already
    // expired (`expired` is `<=`).
    let session = Arc::new(Session::new(
        session_id,
        session_version,
        0,
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
    body.extend_from_slice(b"payload-after-expiry");

    let packet = envelope(ctx, packet_type::CLIENT_TO_SERVER, client_from, &body);
    let mut buf = packet.clone();
    let len = buf.len();
    let handler = PacketKind::from_type_byte(packet_type::CLIENT_TO_SERVER).expect("known type");
    handler.handle(ctx, &mut buf, len, client_from);

    let mut recv_buf = [0u8; 2048];
    assert!(
        try_recv(&harness.peer, &mut recv_buf).is_none(),
        "an expired session must never forward traffic"
    );
}

/// The backend update cadence purges expired sessions from the table
/// outright, not merely refusing to forward for them.
#[test]
fn purge_removes_expired_sessions_from_the_table() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let live = Arc::new(Session::new(1, 1, 1_000, client_addr(), harness.peer_addr, [1u8; 32]));
    let expired = Arc::new(Session::new(2, 1, 10, client_addr(), harness.peer_addr, [2u8; 32]));
    ctx.sessions.set(1 ^ 1, live);
    ctx.sessions.set(2 ^ 1, expired);
    assert_eq!(ctx.sessions.len(), 2);

    ctx.sessions.purge(500);

    assert_eq!(ctx.sessions.len(), 1);
    assert!(ctx.sessions.exists(1 ^ 1));
    assert!(!ctx.sessions.exists(2 ^ 1));
}
