// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The backend HTTP client: `/relay_init` handshake, `/relay_update` loop,
//! and the JSON schemas they speak (§4.7).

pub mod client;
pub mod schema;

pub use client::{spawn_update_loop, Backend};
