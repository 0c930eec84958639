// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The closed set of packet types a dispatcher can receive, and the trait
//! every per-type handler implements. Mirrors the `enum_dispatch` pattern
//! the iSCSI PDU layer uses for its own `SendingData`/`BasicHeaderSegment`
//! traits: one attribute on the trait, one on the enum that wraps every
//! variant, and the match-on-type-byte boilerplate is generated for us.

use enum_dispatch::enum_dispatch;

use crate::{
    consts::packet_type,
    dispatch::{
        context::DispatchContext,
        handlers::{
            ClientToServerHandler, ContinueRequestHandler, ContinueResponseHandler,
            NearPingHandler, RelayPingHandler, RelayPongHandler, RouteRequestHandler,
            RouteResponseHandler, ServerToClientHandler, SessionPingHandler, SessionPongHandler,
        },
    },
    net::address::Address,
};

/// Implemented by every per-packet-type handler. `buf` holds the full
/// wire packet (filter preamble included) received into a reusable
/// scratch buffer; `len` is the number of valid bytes. Handlers never
/// retain `buf` past the call.
#[enum_dispatch]
pub trait PacketHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address);
}

#[enum_dispatch(PacketHandler)]
pub enum PacketKind {
    RelayPing(RelayPingHandler),
    RelayPong(RelayPongHandler),
    RouteRequest(RouteRequestHandler),
    RouteResponse(RouteResponseHandler),
    ContinueRequest(ContinueRequestHandler),
    ContinueResponse(ContinueResponseHandler),
    ClientToServer(ClientToServerHandler),
    ServerToClient(ServerToClientHandler),
    SessionPing(SessionPingHandler),
    SessionPong(SessionPongHandler),
    NearPing(NearPingHandler),
}

impl PacketKind {
    /// Maps a preamble's type byte to the handler that owns it. `None`
    /// for anything `basic_packet_filter` let through as structurally
    /// valid but that no handler claims (reserved tags `0x0D`/`0x0E`).
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        use packet_type::*;
        Some(match byte {
            RELAY_PING => PacketKind::RelayPing(RelayPingHandler),
            RELAY_PONG => PacketKind::RelayPong(RelayPongHandler),
            ROUTE_REQUEST => PacketKind::RouteRequest(RouteRequestHandler),
            ROUTE_RESPONSE => PacketKind::RouteResponse(RouteResponseHandler),
            CONTINUE_REQUEST => PacketKind::ContinueRequest(ContinueRequestHandler),
            CONTINUE_RESPONSE => PacketKind::ContinueResponse(ContinueResponseHandler),
            CLIENT_TO_SERVER => PacketKind::ClientToServer(ClientToServerHandler),
            SERVER_TO_CLIENT => PacketKind::ServerToClient(ServerToClientHandler),
            SESSION_PING => PacketKind::SessionPing(SessionPingHandler),
            SESSION_PONG => PacketKind::SessionPong(SessionPongHandler),
            NEAR_PING => PacketKind::NearPing(NearPingHandler),
            _ => return None,
        })
    }
}
