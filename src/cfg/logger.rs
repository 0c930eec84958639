// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::filter_fn, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// `target` tracing events carry when they belong to the once-a-second
/// throughput summary rather than general diagnostics (see
/// [`crate::core::throughput::ThroughputRecorder::report`]).
const THROUGHPUT_TARGET: &str = "throughput";

/// Keeps every non-blocking writer this process installed alive for as
/// long as logs should keep flushing; dropping a guard flushes and closes
/// its writer.
pub struct LoggerGuards {
    _stdout: WorkerGuard,
    _throughput_file: Option<WorkerGuard>,
}

/// Path the throughput reporter writes to independently of the structured
/// log sink, so operators can tail raw per-second counters without parsing
/// the rest of the log stream. Unset means throughput lines stay in the
/// normal stdout stream alongside everything else.
pub fn throughput_log_file() -> Option<String> {
    std::env::var("RELAY_LOG_FILE").ok()
}

/// Installs the global `tracing` subscriber for the life of the process.
/// Verbosity comes from `RUST_LOG` (defaulting to `info`). General
/// diagnostics always go to stdout; when `RELAY_LOG_FILE` names a path,
/// the once-a-second throughput summary is routed there instead of stdout
/// so an operator can tail raw counters without parsing the rest of the
/// log stream.
pub fn init_logger() -> Result<LoggerGuards> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")).context("invalid RUST_LOG")?;

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let throughput_path = throughput_log_file();
    let splitting_throughput = throughput_path.is_some();

    let stdout_layer = fmt::layer()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(filter_fn(move |meta| !splitting_throughput || meta.target() != THROUGHPUT_TARGET));

    let (throughput_layer, throughput_guard) = match throughput_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open RELAY_LOG_FILE at {path}"))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(false)
                .with_filter(filter_fn(|meta| meta.target() == THROUGHPUT_TARGET));
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(throughput_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggerGuards { _stdout: stdout_guard, _throughput_file: throughput_guard })
}
