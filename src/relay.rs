// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Top-level orchestration: builds the shared state every thread touches,
//! spins up the dispatcher pool, the pinger, the throughput reporter, and
//! the backend update loop, wires signal handling, and joins everything
//! back down on shutdown (§5).

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{error, info};

use crate::{
    backend::{self, Backend},
    cfg::config::RelayConfig,
    core::{relay_manager::RelayManager, router_info::RouterInfo, session_map::SessionMap, throughput::ThroughputRecorder},
    dispatch::spawn_dispatchers,
    error::RelayError,
    pinger,
};

/// Polls the raw flags [`signal_hook::flag::register`] sets on signal
/// delivery and translates them into the cooperative shutdown state every
/// other thread already watches. Signal handlers themselves must stay
/// async-signal-safe, so all the actual decision-making happens here on a
/// plain thread instead.
fn spawn_signal_watcher(should_loop: Arc<AtomicBool>, shutting_down: Arc<AtomicBool>) -> Result<thread::JoinHandle<()>, RelayError> {
    let sigint = Arc::new(AtomicBool::new(false));
    let sigterm = Arc::new(AtomicBool::new(false));
    let sighup = Arc::new(AtomicBool::new(false));

    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&sigint)).map_err(RelayError::Socket)?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&sigterm)).map_err(RelayError::Socket)?;
    signal_hook::flag::register(signal_hook::consts::SIGHUP, Arc::clone(&sighup)).map_err(RelayError::Socket)?;

    let handle = thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            while should_loop.load(Ordering::Relaxed) {
                if sigint.load(Ordering::Relaxed) {
                    info!("SIGINT received, stopping immediately");
                    should_loop.store(false, Ordering::Relaxed);
                    break;
                }
                if (sigterm.load(Ordering::Relaxed) || sighup.load(Ordering::Relaxed))
                    && !shutting_down.swap(true, Ordering::Relaxed)
                {
                    info!("SIGTERM/SIGHUP received, entering clean shutdown");
                }
                thread::sleep(Duration::from_millis(100));
            }
        })
        .map_err(RelayError::Socket)?;
    Ok(handle)
}

pub fn run(cfg: RelayConfig) -> Result<(), RelayError> {
    let sessions = Arc::new(SessionMap::new());
    let relays = Arc::new(RelayManager::new());
    let router_info = Arc::new(RouterInfo::new([0u8; 8]));
    let throughput = ThroughputRecorder::new();

    let should_loop = Arc::new(AtomicBool::new(true));
    let shutting_down = Arc::new(AtomicBool::new(false));

    let backend = Arc::new(Backend::new(&cfg));
    backend.init(&router_info)?;

    let signal_handle = spawn_signal_watcher(Arc::clone(&should_loop), Arc::clone(&shutting_down))?;

    let dispatcher_handles = spawn_dispatchers(
        cfg.address,
        cfg.processor_count,
        Arc::clone(&sessions),
        Arc::clone(&relays),
        Arc::clone(&router_info),
        Arc::clone(&throughput),
        cfg.private_key.clone(),
        cfg.router_public_key,
        Arc::clone(&should_loop),
    )?;

    let pinger_handle = pinger::spawn_pinger(
        cfg.address,
        Arc::clone(&relays),
        Arc::clone(&router_info),
        Arc::clone(&throughput),
        Arc::clone(&should_loop),
    )?;

    let reporter_handle = throughput.spawn_reporter(Arc::clone(&should_loop));

    let backend_handle = backend::spawn_update_loop(
        Arc::clone(&backend),
        Arc::clone(&sessions),
        Arc::clone(&relays),
        Arc::clone(&router_info),
        Arc::clone(&throughput),
        Arc::clone(&should_loop),
        Arc::clone(&shutting_down),
    );

    for handle in dispatcher_handles {
        if handle.join().is_err() {
            error!("a dispatcher thread panicked");
        }
    }
    if pinger_handle.join().is_err() {
        error!("the pinger thread panicked");
    }
    if reporter_handle.join().is_err() {
        error!("the throughput reporter thread panicked");
    }
    if signal_handle.join().is_err() {
        error!("the signal watcher thread panicked");
    }

    match backend_handle.join() {
        Ok(result) => result,
        Err(_) => {
            error!("the backend update thread panicked");
            Ok(())
        },
    }
}
