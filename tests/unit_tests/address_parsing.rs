// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use relay_node::net::address::Address;

#[test]
fn parses_ipv4_socket_strings() {
    let addr = Address::parse("203.0.113.5:40000").expect("parses");
    match addr {
        Address::V4 { octets, port } => {
            assert_eq!(octets, [203, 0, 113, 5]);
            assert_eq!(port, 40000);
        },
        other => panic!("expected V4, got {other:?}"),
    }
}

#[test]
fn parses_ipv6_socket_strings() {
    let addr = Address::parse("[::1]:9000").expect("parses");
    assert!(matches!(addr, Address::V6 { port: 9000, .. }));
}

#[test]
fn rejects_strings_without_a_port() {
    assert!(Address::parse("203.0.113.5").is_err());
}

#[test]
fn display_round_trips_through_parse_for_v4() {
    let addr = Address::parse("10.0.0.2:4000").expect("parses");
    let rendered = addr.to_string();
    let reparsed = Address::parse(&rendered).expect("reparses");
    assert_eq!(addr, reparsed);
}
