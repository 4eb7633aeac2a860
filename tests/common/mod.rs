// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::{to_bytes, Body};
use axum::response::Response;
use bson::oid::ObjectId;
use castle_scouting::config::Config;
use castle_scouting::db::MongoDb;
use castle_scouting::middleware::auth::{create_jwt, SESSION_SECS};
use castle_scouting::routes::create_router;
use castle_scouting::AppState;
use std::sync::Arc;

/// Shared access code matching `Config::test_default()`.
#[allow(dead_code)]
pub const ACCESS_CODE: &str = "test-access-code";

/// Check if a test MongoDB is available via environment variable.
#[allow(dead_code)]
pub fn mongo_available() -> bool {
    std::env::var("MONGODB_TEST_URI").is_ok()
}

/// Skip test with message if MongoDB not available.
#[macro_export]
macro_rules! require_mongo {
    () => {
        if !crate::common::mongo_available() {
            eprintln!("⚠️  Skipping: MONGODB_TEST_URI not set");
            return;
        }
    };
}

/// Connect to a fresh database on the test server.
#[allow(dead_code)]
pub async fn test_db() -> MongoDb {
    use std::time::{SystemTime, UNIX_EPOCH};

    let uri = std::env::var("MONGODB_TEST_URI").expect("MONGODB_TEST_URI not set");
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let db = MongoDb::connect(&uri, &format!("castle_test_{}", nanos))
        .await
        .expect("Failed to connect to test MongoDB");
    db.ensure_indexes().await.expect("Failed to create indexes");
    db
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> MongoDb {
    MongoDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::test_default(), test_db_offline()));
    (create_router(state.clone()), state)
}

/// Session token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &ObjectId, signing_key: &[u8]) -> String {
    create_jwt(user_id, SESSION_SECS, signing_key).unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
