// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.
//!
//! Every case here is rejected before the database is touched, so the
//! offline mock is enough.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bson::oid::ObjectId;
use serde_json::json;
use tower::ServiceExt;

mod common;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> StatusCode {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap().status()
}

fn authed() -> (Router, String) {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(&ObjectId::new(), &state.config.jwt_signing_key);
    (app, token)
}

#[tokio::test]
async fn test_register_invalid_email() {
    let (app, _) = common::create_test_app();
    let status = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "username": "scout",
            "password": "longenough1",
            "confirm_password": "longenough1",
            "team_passcode": common::ACCESS_CODE,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_wrong_access_code() {
    let (app, _) = common::create_test_app();
    let status = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "email": "scout@example.com",
            "username": "scout",
            "password": "longenough1",
            "confirm_password": "longenough1",
            "team_passcode": "wrong-code",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_password_mismatch() {
    let (app, _) = common::create_test_app();
    let status = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "email": "scout@example.com",
            "username": "scout",
            "password": "longenough1",
            "confirm_password": "longenough2",
            "team_passcode": common::ACCESS_CODE,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_missing_fields() {
    let (app, _) = common::create_test_app();
    let status = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "login": "", "password": "", "team_passcode": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_wrong_access_code() {
    let (app, _) = common::create_test_app();
    let status = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "login": "scout", "password": "longenough1", "team_passcode": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_settings_username_too_long() {
    let (app, token) = authed();
    let status = send(
        &app,
        "POST",
        "/auth/settings",
        Some(&token),
        Some(json!({ "username": "a".repeat(51) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_object_id_in_path() {
    let (app, token) = authed();
    for (method, uri) in [
        ("GET", "/scouting/not-an-id"),
        ("POST", "/scouting/delete/1234"),
        ("POST", "/team/assignments/xyz/delete"),
        ("POST", "/notifications/assignments/xyz/unsubscribe"),
    ] {
        let status = send(&app, method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_non_numeric_team_in_path() {
    let (app, token) = authed();
    let status = send(&app, "GET", "/api/team_stats/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_needs_two_teams() {
    let (app, token) = authed();
    let status = send(&app, "GET", "/api/compare?team1=254", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_team_paths_needs_team() {
    let (app, token) = authed();
    let status = send(&app, "GET", "/api/team_paths", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scouter_leaderboard_bad_team_filter() {
    let (app, token) = authed();
    let status = send(
        &app,
        "GET",
        "/scouter-leaderboard?team=abc",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_team_number_out_of_range() {
    let (app, token) = authed();
    let status = send(
        &app,
        "POST",
        "/team/create",
        Some(&token),
        Some(json!({ "team_number": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assignment_without_title() {
    let (app, token) = authed();
    let status = send(
        &app,
        "POST",
        "/team/254/assignments",
        Some(&token),
        Some(json!({ "title": "", "assigned_to": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vapid_key_missing_when_push_disabled() {
    let (app, token) = authed();
    let status = send(
        &app,
        "GET",
        "/notifications/vapid-public-key",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
