// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use relay_node::{
    consts::{packet_type, HEADER_SIZE, REPLAY_WINDOW_SIZE},
    core::{header::{Header, SessionFlags}, session::Session},
    dispatch::packet_kind::{PacketHandler, PacketKind},
};

use crate::integration_tests::common::{build_harness, client_addr, envelope, try_recv};

/// A sequence number that falls more than `REPLAY_WINDOW_SIZE` behind the
/// most recent one accepted is indistinguishable from a duplicate to the
/// ring buffer and must be dropped the same way — the window has no
/// memory of anything that far back.
#[test]
fn sequence_far_behind_the_window_is_dropped() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let session_id = 55u64;
    let session_version = 1u8;
    let private_key = [0x55u8; 32];
    let client_from = client_addr();

    let session = Arc::new(Session::new(
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
        state.client_to_server_replay.advance(REPLAY_WINDOW_SIZE as u64 + 300);
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
    body.extend_from_slice(b"stale-payload");

    let packet = envelope(ctx, packet_type::CLIENT_TO_SERVER, client_from, &body);
    let mut buf = packet.clone();
    let len = buf.len();
    let handler = PacketKind::from_type_byte(packet_type::CLIENT_TO_SERVER).expect("known type");
    handler.handle(ctx, &mut buf, len, client_from);

    let mut recv_buf = [0u8; 2048];
    assert!(
        try_recv(&harness.peer, &mut recv_buf).is_none(),
        "a sequence number far outside the window must never forward"
    );
}

/// A `RouteResponse`/`ContinueResponse`/session-ping sequence at or below
/// the high-water mark already recorded must be dropped, since those
/// directions use a strict monotonic counter rather than a replay window.
#[test]
fn route_response_at_or_below_high_water_mark_is_dropped() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let session_id = 66u64;
    let session_version = 1u8;
    let private_key = [0x66u8; 32];
    let client_from = client_addr();

    // `prev_addr` is the direction a RouteResponse forwards back towards,
    // so it must point at the socket this test can actually observe.
    let session = Arc::new(Session::new(
        session_id,
        session_version,
        ctx.router_info.current_timestamp() + 3600,
        harness.peer_addr,
        client_from,
        private_key,
    ));
    {
        let mut state = session.state.lock().expect("lock");
        state.server_to_client_seq = 10;
    }
    let key = session_id ^ u64::from(session_version);
    ctx.sessions.set(key, session);

    let header = Header {
        packet_type: packet_type::ROUTE_RESPONSE,
        sequence: 10,
        session_id,
        session_version,
        session_flags: SessionFlags::empty(),
    };
    let mut header_bytes = [0u8; HEADER_SIZE];
    header.write(&private_key, &mut header_bytes);

    let packet = envelope(ctx, packet_type::ROUTE_RESPONSE, client_from, &header_bytes);
    let mut buf = packet.clone();
    let len = buf.len();
    let handler = PacketKind::from_type_byte(packet_type::ROUTE_RESPONSE).expect("known type");
    handler.handle(ctx, &mut buf, len, client_from);

    let mut recv_buf = [0u8; 2048];
    assert!(
        try_recv(&harness.peer, &mut recv_buf).is_none(),
        "a non-increasing route response sequence must never forward"
    );
}
