// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that tokens issued at login can be decoded by the
//! auth middleware, catching compatibility issues early.

use bson::oid::ObjectId;
use castle_scouting::error::AppError;
use castle_scouting::middleware::auth::{
    create_jwt, verify_jwt, Claims, REMEMBER_SECS, SESSION_SECS,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};

const KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

#[test]
fn test_jwt_roundtrip() {
    let user_id = ObjectId::new();
    let token = create_jwt(&user_id, SESSION_SECS, KEY).unwrap();

    assert_eq!(verify_jwt(&token, KEY).unwrap(), user_id);
}

#[test]
fn test_remember_me_lifetime() {
    let token = create_jwt(&ObjectId::new(), REMEMBER_SECS, KEY).unwrap();

    let data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(KEY),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap();
    assert_eq!(data.claims.exp - data.claims.iat, REMEMBER_SECS as usize);
}

#[test]
fn test_jwt_wrong_key_fails() {
    let token = create_jwt(&ObjectId::new(), SESSION_SECS, KEY).unwrap();

    let result = verify_jwt(&token, b"wrong_key_that_is_32_bytes_long!");
    assert!(matches!(result, Err(AppError::InvalidToken)));
}

#[test]
fn test_expired_jwt_rejected() {
    let claims = Claims {
        sub: ObjectId::new().to_hex(),
        iat: now() - 7200,
        exp: now() - 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(KEY),
    )
    .unwrap();

    assert!(matches!(verify_jwt(&token, KEY), Err(AppError::InvalidToken)));
}

#[test]
fn test_non_object_id_subject_rejected() {
    let claims = Claims {
        sub: "12345".to_string(),
        iat: now(),
        exp: now() + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(KEY),
    )
    .unwrap();

    assert!(matches!(verify_jwt(&token, KEY), Err(AppError::InvalidToken)));
}
