// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Context;
use relay_node::{cfg::config::RelayConfig, cfg::logger::init_logger, error::RelayError, relay};

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logger().context("failed to initialize logging")?;
    let cfg = RelayConfig::from_env().context("failed to load configuration")?;

    match relay::run(cfg) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(%err, "relay exited with an error");
            std::process::exit(exit_code(&err));
        },
    }
}

fn exit_code(err: &RelayError) -> i32 {
    err.exit_code()
}
