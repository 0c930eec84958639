// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One handler per packet type, each doing the same shape of work: pass
//! the anti-spoofing filter, authenticate (a header tag or a sealed
//! token), update whatever per-session state that type owns, and forward
//! verbatim to the next hop. Authentication always happens before any
//! state mutation — a packet that fails its tag check must never be able
//! to advance a sequence counter or a replay window, since that would let
//! a forged packet alone poison anti-replay state for the genuine sender.
//!
//! Every forward re-stamps the filter preamble for the new hop rather
//! than reusing the one we received: pittle/chonkle are keyed on the
//! (from, to) address pair, which always changes at least one side
//! crossing a hop, so the old preamble would simply fail the next
//! relay's advanced filter.

use std::sync::Arc;

use tracing::trace;

use crate::{
    consts::{self, packet_type, FILTER_PREAMBLE_SIZE, HEADER_SIZE, MTU},
    core::{
        bandwidth, clock, filter,
        header::{clean_sequence, Header},
        session::Session,
        session_map::SessionRef,
        throughput::Category,
    },
    dispatch::{context::DispatchContext, packet_kind::PacketHandler},
    net::address::{Address, ADDRESS_BYTES},
    token::{
        continue_token::CONTINUE_TOKEN_ENCRYPTED_SIZE, route_token::ROUTE_TOKEN_ENCRYPTED_SIZE,
        ContinueToken, RouteToken,
    },
};

/// Checks the cheap structural filter, then the address/magic-keyed one
/// against every magic this relay currently accepts — a packet is valid
/// if it matches any of the previous, current, or next router magic.
fn passes_filter(ctx: &DispatchContext, buf: &[u8], from: Address, len: usize) -> bool {
    if !filter::basic_packet_filter(buf) {
        return false;
    }
    let from_key = from.filter_key();
    let to_key = ctx.bind_address.filter_key();
    let length = len as u16;
    ctx.router_info
        .snapshot()
        .iter()
        .any(|magic| filter::advanced_packet_filter(buf, magic, from_key, to_key, length))
}

/// A session this relay still considers live, or `None` — an expired
/// session is treated identically to a missing one by every handler.
fn find_live_session(ctx: &DispatchContext, key: u64) -> Option<SessionRef> {
    let session = ctx.sessions.get(key)?;
    if session.expired(ctx.router_info.current_timestamp()) {
        None
    } else {
        Some(session)
    }
}

/// Parses and authenticates the header carried in `buf[FILTER_PREAMBLE_SIZE..len]`
/// against the session it names. Returns the live session and its
/// authenticated header, or `None` for any failure along the way —
/// unknown/expired session and a bad tag are indistinguishable to a caller.
fn authenticate_session_header(
    ctx: &DispatchContext,
    buf: &[u8],
    len: usize,
    from: Address,
) -> Option<(SessionRef, Header)> {
    if !passes_filter(ctx, buf, from, len) {
        return None;
    }
    let body = &buf[FILTER_PREAMBLE_SIZE..len];
    let header = Header::peek(body)?;
    let key = header.session_id ^ u64::from(header.session_version);
    let session = find_live_session(ctx, key)?;
    header.verify(&session.private_key, body).ok()?;
    Some((session, header))
}

/// Re-stamps a fresh filter preamble for (this relay, `to`) and sends
/// `body` (a header, or a header plus payload, or a raw token remainder)
/// unchanged behind it.
fn forward(ctx: &DispatchContext, kind: u8, body: &[u8], to: Address) {
    let total_len = FILTER_PREAMBLE_SIZE + body.len();
    let mut out = vec![0u8; total_len];
    filter::write_filter(
        &mut out,
        kind,
        &ctx.router_info.current(),
        ctx.bind_address.filter_key(),
        to.filter_key(),
        total_len as u16,
    );
    out[FILTER_PREAMBLE_SIZE..].copy_from_slice(body);
    if let Err(err) = ctx.socket.send(&out, to) {
        trace!(%to, %err, "forward send failed");
    }
}

pub struct RelayPingHandler;

impl PacketHandler for RelayPingHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if len != FILTER_PREAMBLE_SIZE + consts::RELAY_PING_SIZE {
            return;
        }
        if !passes_filter(ctx, buf, from, len) {
            return;
        }
        ctx.throughput.record(Category::RelayPing, len);

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        let reply_to = match Address::read(&body[8..8 + ADDRESS_BYTES]) {
            Ok(addr) => addr,
            Err(_) => return,
        };

        let mut reply_body = [0u8; consts::RELAY_PING_SIZE];
        reply_body[0..8].copy_from_slice(&body[0..8]);
        let mut own = [0u8; ADDRESS_BYTES];
        ctx.bind_address.write(&mut own);
        reply_body[8..8 + ADDRESS_BYTES].copy_from_slice(&own);

        forward(ctx, packet_type::RELAY_PONG, &reply_body, reply_to);
        ctx.throughput.record(Category::RelayPong, FILTER_PREAMBLE_SIZE + reply_body.len());
    }
}

pub struct RelayPongHandler;

impl PacketHandler for RelayPongHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if len != FILTER_PREAMBLE_SIZE + consts::RELAY_PING_SIZE {
            return;
        }
        if !passes_filter(ctx, buf, from, len) {
            return;
        }
        ctx.throughput.record(Category::RelayPong, len);

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        let sequence_bytes: [u8; 8] = match body[0..8].try_into() {
            Ok(b) => b,
            Err(_) => return,
        };
        let sequence = u64::from_le_bytes(sequence_bytes);
        // The pong's embedded address, not the wire `from`, is what
        // `RelayManager` tracks each neighbor by — both name the same
        // canonical bind address, but only the embedded one survives a
        // neighbor sending its pong from an ephemeral source port.
        let ponger = match Address::read(&body[8..8 + ADDRESS_BYTES]) {
            Ok(addr) => addr,
            Err(_) => return,
        };
        ctx.relays.process_pong(ponger, sequence);
    }
}

pub struct RouteRequestHandler;

impl PacketHandler for RouteRequestHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if !passes_filter(ctx, buf, from, len) {
            return;
        }
        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        if body.len() < 1 + 2 * ROUTE_TOKEN_ENCRYPTED_SIZE {
            return;
        }
        let token = match RouteToken::decrypt(
            &body[..ROUTE_TOKEN_ENCRYPTED_SIZE],
            &ctx.router_public_key,
            &ctx.relay_private_key,
        ) {
            Ok(token) => token,
            Err(_) => return,
        };
        if token.expire_timestamp <= ctx.router_info.current_timestamp() {
            trace!(session_id = token.session_id, "route request token already expired");
            return;
        }

        let key = token.session_key();
        match ctx.sessions.get(key) {
            // An already-live session's route never changes underneath
            // it; a repeated RouteRequest only ever refreshes expiry.
            Some(existing) => existing.refresh_expiry(token.expire_timestamp),
            None => {
                let session = Arc::new(Session::new(
                    token.session_id,
                    token.session_version,
                    token.expire_timestamp,
                    from,
                    token.next_addr,
                    token.private_key,
                ));
                {
                    let mut state = session.state.lock().expect("session state mutex poisoned");
                    state.kbps_up = token.kbps_up;
                    state.kbps_down = token.kbps_down;
                }
                ctx.sessions.set(key, session);
            },
        }

        let rest = &body[ROUTE_TOKEN_ENCRYPTED_SIZE..];
        forward(ctx, packet_type::ROUTE_REQUEST, rest, token.next_addr);
        ctx.throughput.record(Category::RouteRequest, len);
    }
}

pub struct ContinueRequestHandler;

impl PacketHandler for ContinueRequestHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if !passes_filter(ctx, buf, from, len) {
            return;
        }
        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        if body.len() < 1 + 2 * CONTINUE_TOKEN_ENCRYPTED_SIZE {
            return;
        }
        let token = match ContinueToken::decrypt(
            &body[..CONTINUE_TOKEN_ENCRYPTED_SIZE],
            &ctx.router_public_key,
            &ctx.relay_private_key,
        ) {
            Ok(token) => token,
            Err(_) => return,
        };
        if token.expire_timestamp <= ctx.router_info.current_timestamp() {
            return;
        }

        // Unlike a RouteRequest, a ContinueRequest never creates a
        // session — it only extends one that a RouteRequest already
        // established.
        let key = token.session_id ^ u64::from(token.session_version);
        let session = match find_live_session(ctx, key) {
            Some(session) => session,
            None => return,
        };
        session.extend_expiry_if_greater(token.expire_timestamp);

        let rest = &body[CONTINUE_TOKEN_ENCRYPTED_SIZE..];
        forward(ctx, packet_type::CONTINUE_REQUEST, rest, session.next_addr);
        ctx.throughput.record(Category::ContinueRequest, len);
    }
}

pub struct RouteResponseHandler;

impl PacketHandler for RouteResponseHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if len != FILTER_PREAMBLE_SIZE + HEADER_SIZE {
            return;
        }
        let (session, header) = match authenticate_session_header(ctx, buf, len, from) {
            Some(pair) => pair,
            None => return,
        };

        let clean = clean_sequence(header.sequence);
        let accepted = {
            let mut state = session.state.lock().expect("session state mutex poisoned");
            if clean <= state.server_to_client_seq {
                false
            } else {
                state.server_to_client_seq = clean;
                true
            }
        };
        if !accepted {
            trace!(session_id = session.session_id, "stale route response sequence dropped");
            return;
        }

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        forward(ctx, packet_type::ROUTE_RESPONSE, body, session.prev_addr);
        ctx.throughput.record(Category::RouteResponse, len);
    }
}

pub struct ContinueResponseHandler;

impl PacketHandler for ContinueResponseHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if len != FILTER_PREAMBLE_SIZE + HEADER_SIZE {
            return;
        }
        let (session, header) = match authenticate_session_header(ctx, buf, len, from) {
            Some(pair) => pair,
            None => return,
        };

        let clean = clean_sequence(header.sequence);
        let accepted = {
            let mut state = session.state.lock().expect("session state mutex poisoned");
            if clean <= state.server_to_client_seq {
                false
            } else {
                state.server_to_client_seq = clean;
                true
            }
        };
        if !accepted {
            return;
        }

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        forward(ctx, packet_type::CONTINUE_RESPONSE, body, session.prev_addr);
        ctx.throughput.record(Category::ContinueResponse, len);
    }
}

pub struct SessionPingHandler;

impl PacketHandler for SessionPingHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        let min_len = FILTER_PREAMBLE_SIZE + HEADER_SIZE;
        if len < min_len || len > min_len + 32 {
            return;
        }
        let (session, header) = match authenticate_session_header(ctx, buf, len, from) {
            Some(pair) => pair,
            None => return,
        };

        let clean = clean_sequence(header.sequence);
        let accepted = {
            let mut state = session.state.lock().expect("session state mutex poisoned");
            if clean <= state.client_to_server_seq {
                false
            } else {
                state.client_to_server_seq = clean;
                true
            }
        };
        if !accepted {
            return;
        }

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        forward(ctx, packet_type::SESSION_PING, body, session.next_addr);
        ctx.throughput.record(Category::SessionPing, len);
    }
}

pub struct SessionPongHandler;

impl PacketHandler for SessionPongHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        let min_len = FILTER_PREAMBLE_SIZE + HEADER_SIZE;
        if len < min_len || len > min_len + 32 {
            return;
        }
        let (session, header) = match authenticate_session_header(ctx, buf, len, from) {
            Some(pair) => pair,
            None => return,
        };

        let clean = clean_sequence(header.sequence);
        let accepted = {
            let mut state = session.state.lock().expect("session state mutex poisoned");
            if clean <= state.server_to_client_seq {
                false
            } else {
                state.server_to_client_seq = clean;
                true
            }
        };
        if !accepted {
            return;
        }

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        forward(ctx, packet_type::SESSION_PONG, body, session.prev_addr);
        ctx.throughput.record(Category::SessionPong, len);
    }
}

pub struct ClientToServerHandler;

impl PacketHandler for ClientToServerHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        let min_len = FILTER_PREAMBLE_SIZE + HEADER_SIZE;
        if len <= min_len || len > min_len + MTU {
            return;
        }
        let (session, header) = match authenticate_session_header(ctx, buf, len, from) {
            Some(pair) => pair,
            None => return,
        };

        let clean = clean_sequence(header.sequence);
        let now = clock::now_secs();
        let wire_bits = bandwidth::wire_packet_bits(len);
        let accepted = {
            let mut state = session.state.lock().expect("session state mutex poisoned");
            if state.client_to_server_replay.is_duplicate(clean) {
                false
            } else if state.client_to_server_bandwidth.add_packet(now, state.kbps_up, wire_bits) {
                false
            } else {
                state.client_to_server_replay.advance(clean);
                true
            }
        };
        if !accepted {
            trace!(session_id = session.session_id, "client_to_server packet dropped");
            return;
        }

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        forward(ctx, packet_type::CLIENT_TO_SERVER, body, session.next_addr);
        ctx.throughput.record(Category::ClientToServer, len);
    }
}

pub struct ServerToClientHandler;

impl PacketHandler for ServerToClientHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        let min_len = FILTER_PREAMBLE_SIZE + HEADER_SIZE;
        if len <= min_len || len > min_len + MTU {
            return;
        }
        let (session, header) = match authenticate_session_header(ctx, buf, len, from) {
            Some(pair) => pair,
            None => return,
        };

        let clean = clean_sequence(header.sequence);
        let now = clock::now_secs();
        let wire_bits = bandwidth::wire_packet_bits(len);
        let accepted = {
            let mut state = session.state.lock().expect("session state mutex poisoned");
            if state.server_to_client_replay.is_duplicate(clean) {
                false
            } else if state.server_to_client_bandwidth.add_packet(now, state.kbps_down, wire_bits)
            {
                false
            } else {
                state.server_to_client_replay.advance(clean);
                true
            }
        };
        if !accepted {
            trace!(session_id = session.session_id, "server_to_client packet dropped");
            return;
        }

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        forward(ctx, packet_type::SERVER_TO_CLIENT, body, session.prev_addr);
        ctx.throughput.record(Category::ServerToClient, len);
    }
}

pub struct NearPingHandler;

impl PacketHandler for NearPingHandler {
    fn handle(&self, ctx: &DispatchContext, buf: &mut [u8], len: usize, from: Address) {
        if len != FILTER_PREAMBLE_SIZE + consts::RELAY_PING_SIZE {
            return;
        }
        if !passes_filter(ctx, buf, from, len) {
            return;
        }
        ctx.throughput.record(Category::NearPing, len);

        let body = &buf[FILTER_PREAMBLE_SIZE..len];
        let reply_len = body.len() - consts::NEAR_PING_TRAILER;
        forward(ctx, packet_type::NEAR_PONG, &body[..reply_len], from);
    }
}
