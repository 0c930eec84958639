// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use relay_node::{
    consts::{self, packet_type, ADDRESS_SIZE},
    dispatch::packet_kind::{PacketHandler, PacketKind},
    net::address::Address,
};

use crate::integration_tests::common::{build_harness, envelope, try_recv};

fn addr(port: u16) -> Address {
    Address::V4 { octets: [10, 0, 0, 2], port }
}

/// A relay kept across a backend update keeps its accumulated ping
/// history (and therefore its route stats); one dropped from the update
/// no longer receives pongs attributed to it, and a newly appearing one
/// starts with a clean history even if it reuses a freed slot.
#[test]
fn kept_relay_keeps_history_across_rotation_dropped_relay_does_not() {
    let harness = build_harness();
    let relays = &harness.ctx.relays;

    let kept_addr = addr(2000);
    let dropped_addr = addr(2001);
    relays.update(false, &[1, 2], &[kept_addr, dropped_addr]);
    assert_eq!(relays.len(), 2);

    let pings = relays.due_for_ping();
    let kept_ping = pings.iter().find(|p| p.addr == kept_addr).expect("kept relay is due");
    let dropped_ping = pings.iter().find(|p| p.addr == dropped_addr).expect("dropped relay is due");

    assert!(relays.process_pong(kept_addr, kept_ping.sequence));
    assert!(relays.process_pong(dropped_addr, dropped_ping.sequence));

    // Rotation: `dropped_addr` falls out, a brand new relay takes its place.
    let new_addr = addr(2002);
    relays.update(false, &[1, 3], &[kept_addr, new_addr]);
    assert_eq!(relays.len(), 2);

    let stats = relays.stats(0.0, 1000.0, 0.0);
    let kept_stats = stats.iter().find(|s| s.addr == kept_addr).expect("kept relay tracked");
    let new_stats = stats.iter().find(|s| s.addr == new_addr).expect("new relay tracked");

    // The kept relay answered one ping before rotation: its mean RTT must
    // differ from the default "no data" sentinel.
    assert_ne!(kept_stats.route_stats.rtt_ms, consts::DEFAULT_MEAN_RTT_MS as f32);
    // A brand new relay (even one reusing a freed slot) has no pongs yet.
    assert_eq!(new_stats.route_stats.rtt_ms, consts::DEFAULT_MEAN_RTT_MS as f32);

    assert!(stats.iter().all(|s| s.addr != dropped_addr), "a dropped relay must no longer be tracked");
}

/// A `RelayPong` arriving after rotation is attributed by its own embedded
/// address, so a pong from a relay this manager no longer tracks is
/// silently ignored rather than corrupting another relay's history.
#[test]
fn relay_pong_handler_ignores_untracked_relays() {
    let harness = build_harness();
    let ctx = &harness.ctx;

    let tracked = addr(3000);
    ctx.relays.update(false, &[9], &[tracked]);
    let ping = ctx.relays.due_for_ping();
    let sequence = ping[0].sequence;

    let untracked = addr(3001);
    let mut body = [0u8; consts::RELAY_PING_SIZE];
    body[0..8].copy_from_slice(&sequence.to_le_bytes());
    let mut addr_bytes = [0u8; ADDRESS_SIZE];
    untracked.write(&mut addr_bytes);
    body[8..8 + ADDRESS_SIZE].copy_from_slice(&addr_bytes);

    let packet = envelope(ctx, packet_type::RELAY_PONG, untracked, &body);
    let mut buf = packet.clone();
    let len = buf.len();
    let handler = PacketKind::from_type_byte(packet_type::RELAY_PONG).expect("known type");
    handler.handle(ctx, &mut buf, len, untracked);

    let stats = ctx.relays.stats(0.0, 1000.0, 0.0);
    let tracked_stats = stats.iter().find(|s| s.addr == tracked).expect("still tracked");
    assert_eq!(
        tracked_stats.route_stats.rtt_ms,
        consts::DEFAULT_MEAN_RTT_MS as f32,
        "a pong from an untracked relay must not be attributed to a tracked one"
    );

    // Sanity: nothing forwarded either, RelayPong is terminal.
    let mut recv_buf = [0u8; 64];
    assert!(try_recv(&harness.peer, &mut recv_buf).is_none());
}
