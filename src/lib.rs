// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Castle Scouting: FRC match and pit scouting backend
//!
//! This crate provides the JSON API for scouting data, team management,
//! assignments and Web Push reminders, backed by MongoDB.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::time::Duration;

use config::Config;
use db::MongoDb;
use middleware::RateLimiter;
use services::{PushService, VapidKey};

/// Requests per client per window on the throttled routes.
const RATE_LIMIT_MAX: u32 = 30;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MongoDb,
    /// `None` when no VAPID key is configured
    pub push: Option<PushService>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Build state from configuration. An unusable VAPID key disables push
    /// rather than failing startup.
    pub fn new(config: Config, db: MongoDb) -> Self {
        let push = match (&config.vapid_private_key, &config.vapid_public_key) {
            (Some(private), Some(public)) => match VapidKey::from_base64(private, public) {
                Ok(key) => Some(PushService::new(key, config.vapid_subject.clone())),
                Err(e) => {
                    tracing::error!(error = %e, "Invalid VAPID key, push disabled");
                    None
                }
            },
            _ => None,
        };

        Self {
            config,
            db,
            push,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MAX, RATE_LIMIT_WINDOW),
        }
    }
}
