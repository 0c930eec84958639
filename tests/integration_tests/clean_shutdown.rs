// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use rand::rngs::OsRng;
use relay_node::{
    backend::client::{spawn_update_loop, Backend},
    cfg::config::RelayConfig,
    core::{relay_manager::RelayManager, router_info::RouterInfo, session_map::SessionMap, throughput::ThroughputRecorder},
};
use x25519_dalek::{PublicKey, StaticSecret};

/// Reads one HTTP/1.1 request off `stream` far enough to find its
/// `Content-Length` body (the body's contents are never inspected — this
/// mock only cares that a well-formed request arrived) and replies with a
/// fixed 200 JSON body.
fn serve_one(mut stream: TcpStream, body: &str) {
    let mut buf = [0u8; 4096];
    let mut total = Vec::new();
    loop {
        let n = stream.read(&mut buf).unwrap_or(0);
        if n == 0 {
            break;
        }
        total.extend_from_slice(&buf[..n]);
        if let Some(marker) = total.windows(4).position(|w| w == b"\r\n\r\n") {
            let header_end = marker + 4;
            let headers = String::from_utf8_lossy(&total[..header_end]);
            let content_length: usize = headers
                .lines()
                .find_map(|line| line.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            if total.len() >= header_end + content_length {
                break;
            }
        }
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// A trivial backend stand-in that answers every request (on whatever
/// path) with the same canned, always-successful response — enough to
/// drive the update loop's clean-shutdown path without modelling the
/// real backend's routing.
fn spawn_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            serve_one(stream, body);
        }
    });
    addr
}

fn test_config(backend_addr: SocketAddr) -> RelayConfig {
    let relay_secret = StaticSecret::new(OsRng);
    let relay_public = PublicKey::from(&relay_secret);
    let router_secret = StaticSecret::new(OsRng);
    let router_public = PublicKey::from(&router_secret);

    RelayConfig {
        address: "127.0.0.1:1".parse().expect("addr"),
        public_key: relay_public,
        private_key: relay_secret,
        router_public_key: router_public,
        backend_hostname: format!("http://{backend_addr}"),
        processor_count: 1,
        log_file: None,
    }
}

/// Once `shutting_down` is already set when the update loop starts, the
/// very first successful `/relay_update` round trip must be enough to end
/// the loop cleanly — it must not wait for `CLEAN_SHUTDOWN_MAX_WAIT_SECONDS`
/// once the backend is cooperating.
#[test]
fn update_loop_exits_on_first_success_once_shutting_down() {
    let update_body = r#"{"version":0,"timestamp":1000,"magic_previous":null,"magic_current":null,"magic_next":null,"ping_data":[]}"#;
    let backend_addr = spawn_mock_backend(update_body);
    let cfg = test_config(backend_addr);

    let router_info = Arc::new(RouterInfo::new([0u8; 8]));
    let sessions = Arc::new(SessionMap::new());
    let relays = Arc::new(RelayManager::new());
    let throughput = ThroughputRecorder::new();
    let backend = Arc::new(Backend::new(&cfg));

    let should_loop = Arc::new(AtomicBool::new(true));
    let shutting_down = Arc::new(AtomicBool::new(true));

    let handle = spawn_update_loop(
        backend,
        sessions,
        relays,
        router_info,
        throughput,
        Arc::clone(&should_loop),
        shutting_down,
    );

    let result = handle.join().expect("update loop thread did not panic");
    assert!(result.is_ok(), "a cooperating backend must let clean shutdown succeed: {result:?}");
    assert!(!should_loop.load(Ordering::Relaxed), "the loop must clear should_loop on clean exit");
}

/// A backend that never answers successfully must eventually be treated
/// as fatal rather than retried forever.
#[test]
fn update_loop_gives_up_when_the_backend_never_succeeds() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        // Accept and immediately drop every connection without replying —
        // every request fails as a transport error.
        for stream in listener.incoming().flatten() {
            drop(stream);
        }
    });
    let cfg = test_config(addr);

    let router_info = Arc::new(RouterInfo::new([0u8; 8]));
    let sessions = Arc::new(SessionMap::new());
    let relays = Arc::new(RelayManager::new());
    let throughput = ThroughputRecorder::new();
    let backend = Arc::new(Backend::new(&cfg));

    let should_loop = Arc::new(AtomicBool::new(true));
    let shutting_down = Arc::new(AtomicBool::new(false));

    let handle = spawn_update_loop(backend, sessions, relays, router_info, throughput, Arc::clone(&should_loop), shutting_down);

    let result = handle.join().expect("update loop thread did not panic");
    assert!(result.is_err(), "a backend that never succeeds must eventually be fatal");
    assert!(!should_loop.load(Ordering::Relaxed));
}

/// During clean shutdown, a backend that never succeeds must still end
/// the loop with `Ok` once the 30s shutdown ceiling elapses, rather than
/// being treated as the fatal 10-consecutive-failures case that applies
/// outside of shutdown — a best-effort `ShuttingDown=true` ack that never
/// lands is not a reason to exit non-zero (§4.7/§8 scenario 6).
#[test]
fn clean_shutdown_exits_ok_even_if_every_update_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            drop(stream);
        }
    });
    let cfg = test_config(addr);

    let router_info = Arc::new(RouterInfo::new([0u8; 8]));
    let sessions = Arc::new(SessionMap::new());
    let relays = Arc::new(RelayManager::new());
    let throughput = ThroughputRecorder::new();
    let backend = Arc::new(Backend::new(&cfg));

    let should_loop = Arc::new(AtomicBool::new(true));
    let shutting_down = Arc::new(AtomicBool::new(true));

    let handle = spawn_update_loop(backend, sessions, relays, router_info, throughput, Arc::clone(&should_loop), shutting_down);

    let result = handle.join().expect("update loop thread did not panic");
    assert!(result.is_ok(), "clean shutdown must ack best-effort even with a dead backend: {result:?}");
    assert!(!should_loop.load(Ordering::Relaxed));
}
