// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use relay_node::{
    consts::FILTER_PREAMBLE_SIZE,
    token::route_token::ROUTE_TOKEN_ENCRYPTED_SIZE,
};

/// A `RouteRequest`'s payload must carry at least two stacked encrypted
/// tokens (one per remaining hop) for the dispatcher's size check to let
/// it through (§4.2): `body.len() >= 1 + 2 * ROUTE_TOKEN_ENCRYPTED_SIZE`.
#[test]
fn minimum_route_request_body_fits_two_stacked_tokens() {
    let minimum_body = 1 + 2 * ROUTE_TOKEN_ENCRYPTED_SIZE;
    assert!(minimum_body > ROUTE_TOKEN_ENCRYPTED_SIZE);

    // Stripping the consumed (first) token from a minimum-sized body must
    // leave at least one more full token's worth of bytes to forward on.
    let remainder = minimum_body - ROUTE_TOKEN_ENCRYPTED_SIZE;
    assert!(remainder >= 1 + ROUTE_TOKEN_ENCRYPTED_SIZE);
}

#[test]
fn full_packet_size_includes_the_filter_preamble() {
    let body_len = 1 + 2 * ROUTE_TOKEN_ENCRYPTED_SIZE;
    let full_packet_len = FILTER_PREAMBLE_SIZE + body_len;
    assert_eq!(full_packet_len, FILTER_PREAMBLE_SIZE + body_len);
    assert!(full_packet_len > body_len);
}
