// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/scouting_app";
const DEFAULT_DATABASE: &str = "scouting_app";
const DEFAULT_VAPID_SUBJECT: &str = "mailto:team334@gmail.com";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// MongoDB connection string
    pub mongo_uri: String,
    /// Database name (falls back to the one named in the URI)
    pub mongo_database: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Hex SHA-256 of the shared team access code
    pub team_access_code_hash: String,
    /// VAPID public key (base64url, uncompressed P-256 point)
    pub vapid_public_key: Option<String>,
    /// VAPID private key (base64url, raw P-256 scalar)
    pub vapid_private_key: Option<String>,
    /// VAPID `sub` claim
    pub vapid_subject: String,
    /// How often the notification scheduler polls
    pub notification_poll_interval: Duration,
    /// Whether session cookies carry the `Secure` attribute
    pub cookie_secure: bool,
    /// Whether a reverse proxy in front of the server appends the peer
    /// address to `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017/scouting_test".to_string(),
            mongo_database: "scouting_test".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            // sha256("test-access-code")
            team_access_code_hash: hash_access_code("test-access-code"),
            vapid_public_key: None,
            vapid_private_key: None,
            vapid_subject: DEFAULT_VAPID_SUBJECT.to_string(),
            notification_poll_interval: Duration::from_secs(60),
            cookie_secure: false,
            trust_proxy: false,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_MONGO_URI.to_string());
        let mongo_database = env::var("MONGO_DB")
            .ok()
            .or_else(|| database_from_uri(&mongo_uri))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let team_access_code_hash = env::var("TEAM_ACCESS_CODE_HASH")
            .map(|v| v.trim().to_ascii_lowercase())
            .map_err(|_| ConfigError::Missing("TEAM_ACCESS_CODE_HASH"))?;
        if team_access_code_hash.len() != 64 || hex::decode(&team_access_code_hash).is_err() {
            return Err(ConfigError::Invalid(
                "TEAM_ACCESS_CODE_HASH",
                "expected 64 hex characters".to_string(),
            ));
        }

        let poll_secs = env::var("NOTIFICATION_POLL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(60);

        Ok(Self {
            mongo_uri,
            mongo_database,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            team_access_code_hash,
            vapid_public_key: non_empty_var("VAPID_PUBLIC_KEY"),
            vapid_private_key: non_empty_var("VAPID_PRIVATE_KEY"),
            vapid_subject: env::var("VAPID_SUBJECT")
                .unwrap_or_else(|_| DEFAULT_VAPID_SUBJECT.to_string()),
            notification_poll_interval: Duration::from_secs(poll_secs),
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            trust_proxy: env::var("TRUST_PROXY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract the default database name from a `mongodb://host/db?opts` URI.
fn database_from_uri(uri: &str) -> Option<String> {
    let rest = uri.split_once("://")?.1;
    let path = rest.split_once('/')?.1;
    let name = path.split('?').next().unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Hex-encoded SHA-256 of an access code, the format stored in config.
pub fn hash_access_code(code: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
