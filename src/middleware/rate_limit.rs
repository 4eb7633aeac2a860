// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fixed-window rate limiting keyed by client address.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::error::AppError;
use crate::AppState;

/// Entries beyond this trigger a sweep of expired windows.
const SWEEP_THRESHOLD: usize = 10_000;

/// In-memory request counter per client.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    /// Count a request from `key`; `false` once it is over the limit.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        if self.windows.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert((now, 0));
        let (started, count) = entry.value_mut();
        if now.duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }
        *count += 1;
        *count <= self.max_requests
    }

    /// Drop windows that have expired.
    pub fn sweep(&self, now: Instant) {
        self.windows
            .retain(|_, (started, _)| now.duration_since(*started) < self.window);
    }
}

/// Client identity for rate limiting.
///
/// This is the peer address unless a trusted proxy sits in front, in which
/// case it is the last `X-Forwarded-For` hop, the one that proxy appended.
/// Earlier hops come from the client and are ignored.
fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(hop) = request
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .last()
        {
            return hop.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting clients over the limit with 429.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&request, state.config.trust_proxy);
    if !state.rate_limiter.check(&key) {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return Err(AppError::TooManyRequests);
    }
    Ok(next.run(request).await)
}
