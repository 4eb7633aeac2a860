// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, security, rate limiting).

pub mod auth;
pub mod rate_limit;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use rate_limit::{rate_limit, RateLimiter};
