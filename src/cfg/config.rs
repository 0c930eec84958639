// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::SocketAddr;

use anyhow::{ensure, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use x25519_dalek::{PublicKey, StaticSecret};

/// Startup configuration, read once from the environment (§6's surface is
/// environment variables, not a config file — there is no hot-reload).
pub struct RelayConfig {
    /// Public bind address and the port advertised to the backend.
    pub address: SocketAddr,
    pub public_key: PublicKey,
    pub private_key: StaticSecret,
    /// The backend's key used to open tokens it seals for this relay and to
    /// seal the init handshake's proof-of-possession payload.
    pub router_public_key: PublicKey,
    /// Base http(s) URL of `/relay_init` and `/relay_update`.
    pub backend_hostname: String,
    /// Dispatcher thread count; defaults to the host's CPU count.
    pub processor_count: usize,
    /// Optional throughput-log sink path.
    pub log_file: Option<String>,
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn decode_key(name: &str, value: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD.decode(value).with_context(|| format!("{name} is not valid base64"))?;
    let array: [u8; 32] =
        bytes.try_into().map_err(|v: Vec<u8>| anyhow::anyhow!("{name} must decode to 32 bytes, got {}", v.len()))?;
    Ok(array)
}

impl RelayConfig {
    /// Reads and validates every variable in §6's environment table.
    pub fn from_env() -> Result<Self> {
        let address: SocketAddr = env_var("RELAY_ADDRESS")?
            .parse()
            .context("RELAY_ADDRESS must be a host:port socket address")?;

        let public_key = PublicKey::from(decode_key("RELAY_PUBLIC_KEY", &env_var("RELAY_PUBLIC_KEY")?)?);
        let private_key = StaticSecret::from(decode_key("RELAY_PRIVATE_KEY", &env_var("RELAY_PRIVATE_KEY")?)?);
        let router_public_key =
            PublicKey::from(decode_key("RELAY_ROUTER_PUBLIC_KEY", &env_var("RELAY_ROUTER_PUBLIC_KEY")?)?);

        let backend_hostname = env_var("RELAY_BACKEND_HOSTNAME")?;

        let processor_count = match std::env::var("RELAY_PROCESSOR_COUNT") {
            Ok(s) => s.parse().context("RELAY_PROCESSOR_COUNT must be a positive integer")?,
            Err(_) => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };

        let log_file = std::env::var("RELAY_LOG_FILE").ok();

        let cfg = RelayConfig {
            address,
            public_key,
            private_key,
            router_public_key,
            backend_hostname,
            processor_count,
            log_file,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.backend_hostname.starts_with("http://") || self.backend_hostname.starts_with("https://"),
            "RELAY_BACKEND_HOSTNAME must be an http(s) URL"
        );
        ensure!(self.processor_count >= 1, "RELAY_PROCESSOR_COUNT must be >= 1");
        Ok(())
    }
}
