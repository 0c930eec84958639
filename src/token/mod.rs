// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Route and continue tokens: the backend's way of telling a relay which
//! session to forward, to whom, and under what private key — sealed so
//! only the addressed relay can read one.

pub mod continue_token;
pub mod route_token;

pub use continue_token::ContinueToken;
pub use route_token::RouteToken;
