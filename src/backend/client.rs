// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The backend HTTP client: the one-shot `/relay_init` handshake and the
//! 1-second `/relay_update` loop. Every request is a short-lived blocking
//! `ureq` call bounded by [`BACKEND_HTTP_TIMEOUT_SECONDS`] — this relay
//! has no async runtime, so the backend thread simply blocks on its own
//! dedicated thread while every other thread keeps forwarding traffic.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use tracing::{info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    backend::schema::{
        InitRequest, InitResponse, Metadata, PingStat, TrafficStats, UpdateRequest, UpdateResponse,
    },
    cfg::config::RelayConfig,
    consts::{
        BACKEND_FAILURE_CEILING_SECONDS, BACKEND_HTTP_TIMEOUT_SECONDS, BACKEND_PROTOCOL_VERSION,
        BACKEND_UPDATE_INTERVAL_SECONDS, CLEAN_SHUTDOWN_MAX_WAIT_SECONDS, INIT_REQUEST_MAGIC,
        MAX_CONSECUTIVE_BACKEND_FAILURES, PING_SAFETY_SECONDS, STATS_WINDOW_SECONDS,
    },
    core::{
        clock, relay_manager::RelayManager, router_info::RouterInfo, session_map::SessionMap,
        throughput::ThroughputRecorder,
    },
    crypto::sealed_box::{self, NONCE_SIZE},
    error::RelayError,
    net::address::Address,
};

pub struct Backend {
    agent: ureq::Agent,
    base_url: String,
    address: SocketAddr,
    private_key: StaticSecret,
    router_public_key: PublicKey,
    relay_public_key_b64: String,
}

impl Backend {
    pub fn new(cfg: &RelayConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(BACKEND_HTTP_TIMEOUT_SECONDS))
            .build();
        Self {
            agent,
            base_url: cfg.backend_hostname.trim_end_matches('/').to_string(),
            address: cfg.address,
            private_key: cfg.private_key.clone(),
            router_public_key: cfg.router_public_key,
            relay_public_key_b64: STANDARD.encode(PublicKey::from(&cfg.private_key).as_bytes()),
        }
    }

    /// One-shot handshake, performed synchronously at startup before any
    /// other thread spins up — there is no sensible forwarding behavior
    /// without an initial `RouterInfo`.
    pub fn init(&self, router_info: &RouterInfo) -> Result<(), RelayError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        // The nonce travels as its own JSON field, so the sealed output's
        // leading nonce copy is redundant here and stripped before encoding.
        let sealed = sealed_box::seal(&[0u8; 32], &self.private_key, &self.router_public_key, nonce);
        let encrypted_token = &sealed[NONCE_SIZE..];

        let request = InitRequest {
            magic_request_protection: INIT_REQUEST_MAGIC,
            version: BACKEND_PROTOCOL_VERSION,
            relay_address: self.address.to_string(),
            nonce: STANDARD.encode(nonce),
            encrypted_token: STANDARD.encode(encrypted_token),
        };

        let response: InitResponse = self
            .agent
            .post(&format!("{}/relay_init", self.base_url))
            .send_json(&request)
            .map_err(|err| RelayError::BackendHandshake(err.to_string()))?
            .into_json()
            .map_err(|err| RelayError::BackendHandshake(err.to_string()))?;

        if response.version != BACKEND_PROTOCOL_VERSION {
            return Err(RelayError::BackendHandshake(format!(
                "relay_init version mismatch: expected {BACKEND_PROTOCOL_VERSION}, got {}",
                response.version
            )));
        }

        router_info.set_current_timestamp(response.timestamp / 1000);
        info!(timestamp = response.timestamp / 1000, "backend init succeeded");
        Ok(())
    }

    fn build_update_request(
        &self,
        sessions: &SessionMap,
        relays: &RelayManager,
        throughput: &ThroughputRecorder,
        shutting_down: bool,
    ) -> UpdateRequest {
        let mut traffic_stats = TrafficStats {
            session_count: sessions.len() as u64,
            ..TrafficStats::default()
        };
        let (kbps_up, kbps_down) = sessions.committed_kbps();
        traffic_stats.envelope_kbps_up = kbps_up;
        traffic_stats.envelope_kbps_down = kbps_down;

        for (label, packets, bytes) in throughput.drain_named() {
            traffic_stats.bytes_measurement_rx += bytes;
            match label {
                "relay_ping" => {
                    traffic_stats.relay_ping_packets += packets;
                    traffic_stats.relay_ping_bytes += bytes;
                },
                "relay_pong" => {
                    traffic_stats.relay_pong_packets += packets;
                    traffic_stats.relay_pong_bytes += bytes;
                },
                "route_request" => {
                    traffic_stats.route_request_packets += packets;
                    traffic_stats.route_request_bytes += bytes;
                },
                "route_response" => {
                    traffic_stats.route_response_packets += packets;
                    traffic_stats.route_response_bytes += bytes;
                },
                "continue_request" => {
                    traffic_stats.continue_request_packets += packets;
                    traffic_stats.continue_request_bytes += bytes;
                },
                "continue_response" => {
                    traffic_stats.continue_response_packets += packets;
                    traffic_stats.continue_response_bytes += bytes;
                },
                "client_to_server" => {
                    traffic_stats.client_to_server_packets += packets;
                    traffic_stats.client_to_server_bytes += bytes;
                },
                "server_to_client" => {
                    traffic_stats.server_to_client_packets += packets;
                    traffic_stats.server_to_client_bytes += bytes;
                },
                "session_ping" => traffic_stats.session_ping_packets += packets,
                "session_pong" => traffic_stats.session_pong_packets += packets,
                "near_ping" => traffic_stats.near_ping_packets += packets,
                _ => {},
            }
        }

        let now = clock::now_secs();
        let ping_stats = relays
            .stats(now - STATS_WINDOW_SECONDS, now, PING_SAFETY_SECONDS)
            .into_iter()
            .map(|relay| PingStat {
                relay_id: relay.id,
                rtt: relay.route_stats.rtt_ms,
                jitter: relay.route_stats.jitter_ms,
                packet_loss: relay.route_stats.packet_loss_percent,
            })
            .collect();

        UpdateRequest {
            version: BACKEND_PROTOCOL_VERSION,
            relay_address: self.address.to_string(),
            metadata: Metadata { public_key: self.relay_public_key_b64.clone() },
            traffic_stats,
            ping_stats,
            shutting_down,
        }
    }

    /// Performs one `/relay_update` round trip and applies its effects.
    /// Returns an error on any transport, version, or parse failure; the
    /// caller (the update loop) is responsible for counting consecutive
    /// failures against the backend failure policy.
    pub fn update_once(
        &self,
        sessions: &SessionMap,
        relays: &RelayManager,
        router_info: &RouterInfo,
        throughput: &ThroughputRecorder,
        shutting_down: bool,
    ) -> Result<(), RelayError> {
        let request = self.build_update_request(sessions, relays, throughput, shutting_down);

        let response: UpdateResponse = self
            .agent
            .post(&format!("{}/relay_update", self.base_url))
            .send_json(&request)
            .map_err(|err| RelayError::BackendHandshake(err.to_string()))?
            .into_json()
            .map_err(|err| RelayError::BackendHandshake(err.to_string()))?;

        if response.version != BACKEND_PROTOCOL_VERSION {
            return Err(RelayError::BackendHandshake(format!(
                "relay_update version mismatch: expected {BACKEND_PROTOCOL_VERSION}, got {}",
                response.version
            )));
        }

        match (response.magic_previous, response.magic_current, response.magic_next) {
            (Some(previous), Some(current), Some(next)) => router_info.set_magics(previous, current, next),
            _ => warn!("relay_update response missing a magic field; keeping prior router info"),
        }
        router_info.set_current_timestamp(response.timestamp);
        sessions.purge(response.timestamp);

        let mut ids = Vec::with_capacity(response.ping_data.len());
        let mut addrs = Vec::with_capacity(response.ping_data.len());
        for entry in response.ping_data {
            match Address::parse(&entry.relay_address) {
                Ok(addr) => {
                    ids.push(entry.relay_id);
                    addrs.push(addr);
                },
                Err(err) => warn!(relay_id = entry.relay_id, %err, "unparseable relay_address in ping_data"),
            }
        }
        relays.update(false, &ids, &addrs);

        Ok(())
    }
}

/// Spawns the backend update thread. Drives `/relay_update` once a second
/// until `should_loop` clears, applying the failure policy (§4.7): a run
/// of [`MAX_CONSECUTIVE_BACKEND_FAILURES`] within [`BACKEND_FAILURE_CEILING_SECONDS`]
/// is fatal. While `shutting_down` is set, every update carries
/// `ShuttingDown = true` and the loop exits on its first success or after
/// [`CLEAN_SHUTDOWN_MAX_WAIT_SECONDS`], whichever comes first.
pub fn spawn_update_loop(
    backend: Arc<Backend>,
    sessions: Arc<SessionMap>,
    relays: Arc<RelayManager>,
    router_info: Arc<RouterInfo>,
    throughput: Arc<ThroughputRecorder>,
    should_loop: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
) -> thread::JoinHandle<Result<(), RelayError>> {
    thread::Builder::new()
        .name("backend-update".into())
        .spawn(move || {
            run_update_loop(&backend, &sessions, &relays, &router_info, &throughput, &should_loop, &shutting_down)
        })
        .expect("spawning the backend update thread")
}

fn run_update_loop(
    backend: &Backend,
    sessions: &SessionMap,
    relays: &RelayManager,
    router_info: &RouterInfo,
    throughput: &ThroughputRecorder,
    should_loop: &AtomicBool,
    shutting_down: &AtomicBool,
) -> Result<(), RelayError> {
    let mut consecutive_failures = 0u32;
    let mut first_failure_at: Option<Instant> = None;
    let mut shutdown_started_at: Option<Instant> = None;

    while should_loop.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_secs(BACKEND_UPDATE_INTERVAL_SECONDS));

        let is_shutting_down = shutting_down.load(Ordering::Relaxed);
        if is_shutting_down && shutdown_started_at.is_none() {
            shutdown_started_at = Some(Instant::now());
        }

        match backend.update_once(sessions, relays, router_info, throughput, is_shutting_down) {
            Ok(()) => {
                consecutive_failures = 0;
                first_failure_at = None;
                if is_shutting_down {
                    should_loop.store(false, Ordering::Relaxed);
                    return Ok(());
                }
            },
            Err(err) => {
                warn!(%err, "backend update failed");
                // During clean shutdown the 10-failures/60s fatal policy no
                // longer applies — §4.7/§8 scenario 6 call for a best-effort
                // ack within the 30s shutdown ceiling, exiting 0 either way.
                if !is_shutting_down {
                    consecutive_failures += 1;
                    let since = *first_failure_at.get_or_insert_with(Instant::now);
                    if consecutive_failures >= MAX_CONSECUTIVE_BACKEND_FAILURES
                        || since.elapsed() >= Duration::from_secs(BACKEND_FAILURE_CEILING_SECONDS)
                    {
                        should_loop.store(false, Ordering::Relaxed);
                        return Err(RelayError::BackendRetriesExhausted(consecutive_failures));
                    }
                }
            },
        }

        if let Some(started) = shutdown_started_at {
            if started.elapsed() >= Duration::from_secs(CLEAN_SHUTDOWN_MAX_WAIT_SECONDS) {
                should_loop.store(false, Ordering::Relaxed);
                return Ok(());
            }
        }
    }

    Ok(())
}
