// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Configuration and logger setup — the parts of the relay that are
//! operator-facing rather than protocol-facing.

pub mod config;
pub mod logger;
