// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! JSON wire schemas for `/relay_init` and `/relay_update`, matching the
//! backend's field casing exactly (`PascalCase` for metrics payloads,
//! `snake_case` for the request/response envelope) rather than this
//! crate's own naming conventions.

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct InitRequest {
    pub magic_request_protection: u32,
    pub version: u32,
    pub relay_address: String,
    pub nonce: String,
    pub encrypted_token: String,
}

#[derive(Deserialize)]
pub struct InitResponse {
    pub version: u32,
    pub timestamp: u64,
}

#[derive(Serialize)]
pub struct Metadata {
    #[serde(rename = "PublicKey")]
    pub public_key: String,
}

/// The backend's roughly two dozen traffic counters, one pair of
/// packets/bytes per forwarded packet category plus a few summary fields.
/// `SessionPing`/`SessionPong`/`NearPing` only ever report a packet count —
/// their payload size is fixed and uninteresting for capacity planning.
#[derive(Serialize, Default)]
pub struct TrafficStats {
    #[serde(rename = "BytesMeasurementRx")]
    pub bytes_measurement_rx: u64,
    #[serde(rename = "SessionCount")]
    pub session_count: u64,
    #[serde(rename = "EnvelopeKbpsUp")]
    pub envelope_kbps_up: u64,
    #[serde(rename = "EnvelopeKbpsDown")]
    pub envelope_kbps_down: u64,

    #[serde(rename = "RelayPingPackets")]
    pub relay_ping_packets: u64,
    #[serde(rename = "RelayPingBytes")]
    pub relay_ping_bytes: u64,
    #[serde(rename = "RelayPongPackets")]
    pub relay_pong_packets: u64,
    #[serde(rename = "RelayPongBytes")]
    pub relay_pong_bytes: u64,

    #[serde(rename = "RouteRequestPackets")]
    pub route_request_packets: u64,
    #[serde(rename = "RouteRequestBytes")]
    pub route_request_bytes: u64,
    #[serde(rename = "RouteResponsePackets")]
    pub route_response_packets: u64,
    #[serde(rename = "RouteResponseBytes")]
    pub route_response_bytes: u64,

    #[serde(rename = "ContinueRequestPackets")]
    pub continue_request_packets: u64,
    #[serde(rename = "ContinueRequestBytes")]
    pub continue_request_bytes: u64,
    #[serde(rename = "ContinueResponsePackets")]
    pub continue_response_packets: u64,
    #[serde(rename = "ContinueResponseBytes")]
    pub continue_response_bytes: u64,

    #[serde(rename = "ClientToServerPackets")]
    pub client_to_server_packets: u64,
    #[serde(rename = "ClientToServerBytes")]
    pub client_to_server_bytes: u64,
    #[serde(rename = "ServerToClientPackets")]
    pub server_to_client_packets: u64,
    #[serde(rename = "ServerToClientBytes")]
    pub server_to_client_bytes: u64,

    #[serde(rename = "SessionPingPackets")]
    pub session_ping_packets: u64,
    #[serde(rename = "SessionPongPackets")]
    pub session_pong_packets: u64,
    #[serde(rename = "NearPingPackets")]
    pub near_ping_packets: u64,
}

#[derive(Serialize)]
pub struct PingStat {
    #[serde(rename = "RelayId")]
    pub relay_id: u64,
    #[serde(rename = "RTT")]
    pub rtt: f32,
    #[serde(rename = "Jitter")]
    pub jitter: f32,
    #[serde(rename = "PacketLoss")]
    pub packet_loss: f32,
}

#[derive(Serialize)]
pub struct UpdateRequest {
    pub version: u32,
    pub relay_address: String,
    #[serde(rename = "Metadata")]
    pub metadata: Metadata,
    #[serde(rename = "TrafficStats")]
    pub traffic_stats: TrafficStats,
    #[serde(rename = "PingStats")]
    pub ping_stats: Vec<PingStat>,
    #[serde(rename = "ShuttingDown")]
    pub shutting_down: bool,
}

#[derive(Deserialize)]
pub struct PingDataEntry {
    pub relay_id: u64,
    pub relay_address: String,
}

#[derive(Deserialize)]
pub struct UpdateResponse {
    pub version: u32,
    pub timestamp: u64,
    pub magic_previous: Option<[u8; 8]>,
    pub magic_current: Option<[u8; 8]>,
    pub magic_next: Option<[u8; 8]>,
    pub ping_data: Vec<PingDataEntry>,
}
